use proptest::prelude::*;
use serde_json::json;
use std::time::Duration;
use threshold_alarm::{evaluate, extract, format_duration, parse_duration, Scalar};

proptest! {
    #[test]
    fn test_duration_token_combinations(
        days in proptest::option::of(0u64..400),
        hours in proptest::option::of(0u64..48),
        minutes in proptest::option::of(0u64..120),
        seconds in proptest::option::of(0u64..120),
    ) {
        let mut literal = String::new();
        let mut expected = 0u64;
        for (count, suffix, unit) in [
            (days, 'd', 86_400u64),
            (hours, 'h', 3_600),
            (minutes, 'm', 60),
            (seconds, 's', 1),
        ] {
            if let Some(count) = count {
                literal.push_str(&count.to_string());
                literal.push(suffix);
                expected += count * unit;
            }
        }

        prop_assert_eq!(parse_duration(&literal).unwrap(), Duration::from_secs(expected));
    }

    #[test]
    fn test_formatted_durations_parse_back(secs in 0u64..10_000_000) {
        let duration = Duration::from_secs(secs);
        prop_assert_eq!(parse_duration(&format_duration(duration)).unwrap(), duration);
    }

    #[test]
    fn test_unit_letters_out_of_order_are_rejected(a in 1u64..100, b in 1u64..100) {
        let seconds_first = format!("{}s{}m", a, b);
        let hours_last = format!("{}m{}h", a, b);
        prop_assert!(parse_duration(&seconds_first).is_err());
        prop_assert!(parse_duration(&hours_last).is_err());
    }

    #[test]
    fn test_nested_path_extraction(value in -1.0e12f64..1.0e12, key in "[a-z]{1,8}") {
        let mut inner = serde_json::Map::new();
        inner.insert(key.clone(), json!(value));
        let payload = json!({ "outer": inner });
        let path = format!("outer.{}", key);
        prop_assert_eq!(extract(&payload, Some(&path)).unwrap(), Scalar::Number(value));

        let missing = format!("outer.{}_missing", key);
        prop_assert!(extract(&payload, Some(&missing)).unwrap_err().is_extraction());
    }

    #[test]
    fn test_numeric_strings_extract_as_numbers(value in -1.0e9f64..1.0e9) {
        let payload = json!(value.to_string());
        let extracted = extract(&payload, None).unwrap().as_number().unwrap();
        prop_assert!((extracted - value).abs() <= value.abs() * 1e-12);
    }

    #[test]
    fn test_operators_agree_with_std(lhs in -1.0e6f64..1.0e6, rhs in -1.0e6f64..1.0e6) {
        prop_assert_eq!(evaluate("<", lhs, rhs).unwrap(), lhs < rhs);
        prop_assert_eq!(evaluate("<=", lhs, rhs).unwrap(), lhs <= rhs);
        prop_assert_eq!(evaluate(">", lhs, rhs).unwrap(), lhs > rhs);
        prop_assert_eq!(evaluate(">=", lhs, rhs).unwrap(), lhs >= rhs);
        prop_assert_eq!(
            evaluate("=", lhs, rhs).unwrap(),
            !evaluate("!=", lhs, rhs).unwrap()
        );
        if (lhs - rhs).abs() >= f64::EPSILON {
            prop_assert_eq!(evaluate("=", lhs, rhs).unwrap(), lhs == rhs);
            prop_assert_eq!(evaluate("!=", lhs, rhs).unwrap(), lhs != rhs);
        }
        prop_assert!(evaluate("=", lhs, lhs).unwrap());
        prop_assert!(!evaluate("!=", rhs, rhs).unwrap());
    }
}

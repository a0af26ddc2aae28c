use super::*;
use std::str::FromStr;

#[test]
fn test_typed_id_from_raw() {
    let id = UserId::new(42);
    assert_eq!(id.into_inner(), 42);
    assert_eq!(UserId::from(42), id);
}

#[test]
fn test_typed_id_display() {
    assert_eq!(format!("{}", StepId::new(7)), "7");
}

#[test]
fn test_typed_id_from_str() {
    let id = RequestId::from_str(" 1024 ").unwrap();
    assert_eq!(id.into_inner(), 1024);
}

#[test]
fn test_typed_id_from_str_error() {
    assert!(UserId::from_str("invalid").is_err());
}

#[test]
fn test_typed_id_ordering() {
    assert!(StepId::new(1) < StepId::new(12));
}

#[test]
fn test_typed_id_serializes_transparently() {
    let json = serde_json::to_string(&DelegationId::new(5)).unwrap();
    assert_eq!(json, "5");
    let back: DelegationId = serde_json::from_str("5").unwrap();
    assert_eq!(back, DelegationId::new(5));
}

use super::*;

#[test]
fn add_and_print_accumulates() {
    let object = SharedObject::default();
    assert_eq!(object.add_and_print(4), 4);
    assert_eq!(object.add_and_print(-10), -6);
    assert_eq!(object.total(), -6);
}

#[test]
fn add_two_reports_overflow() {
    let object = SharedObject::default();
    assert_eq!(object.add_two(AddNumbers { a: 10, b: 5 }).expect("sum"), 15);
    assert!(matches!(
        object.add_two(AddNumbers { a: i64::MAX, b: 1 }),
        Err(ArithmeticError::Overflow { .. })
    ));
}

#[test]
fn operands_use_capitalized_keys() {
    let pair: AddNumbers = serde_json::from_str(r#"{"A":1,"B":2}"#).expect("decode");
    assert_eq!(pair, AddNumbers { a: 1, b: 2 });
}

#[test]
fn divide_by_zero_is_an_error() {
    assert_eq!(Calculator.divide(9, 3).expect("quotient"), 3);
    assert!(matches!(Calculator.divide(9, 0), Err(ArithmeticError::DivideByZero(9))));
}

#[test]
fn samples_register_once() {
    let registry = Registry::new();
    register_samples(&registry).expect("first registration");
    assert_eq!(registry.identifiers(), vec!["bar", "calc", "foo"]);
    assert!(matches!(
        register_samples(&registry),
        Err(RegistryError::DuplicateIdentifier(id)) if id == "foo"
    ));
}

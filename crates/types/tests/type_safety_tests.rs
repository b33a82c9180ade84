//! Whole-program checker scenarios.

use quill_syntax::{lex, parse};
use quill_types::check;

fn check_source(source: &str) -> Result<(), quill_types::CheckError> {
    let mut program = parse(&lex(source).unwrap()).unwrap();
    check(&mut program)
}

#[test]
fn accepts_realistic_programs() {
    let src = "
        struct Account { string owner, double balance }

        double deposit(Account a, double amount) {
          a.balance = a.balance + amount
          return a.balance
        }

        void main() {
          Account a = new Account
          a.owner = \"ada\"
          a.balance = 0.0
          double total = deposit(a, 12.5)
          print(to_string(total))
          array Account all = new Account[2]
          all[0] = a
          print(length(all))
        }
    ";
    assert!(check_source(src).is_ok());
}

#[test]
fn recursive_functions_check() {
    let src = "
        int fact(int n) {
          if (n <= 1) { return 1 }
          return n * fact(n - 1)
        }
        void main() { print(fact(5)) }
    ";
    assert!(check_source(src).is_ok());
}

#[test]
fn argument_types_are_enforced() {
    let src = "
        int f(int a, string b) { return a }
        void main() { int x = f(\"flip\", 1) }
    ";
    let err = check_source(src).unwrap_err();
    assert!(err.message.contains("expected `int`"));
}

#[test]
fn null_flows_through_calls_and_fields() {
    let src = "
        struct Node { int value, Node next }
        void main() {
          Node n = new Node
          n.next = null
          if (n.next == null) { print(\"empty\") }
        }
    ";
    assert!(check_source(src).is_ok());
}

#[test]
fn struct_cycles_are_fine_but_unknown_types_are_not() {
    assert!(check_source("struct A { B b } struct B { A a } void main() {}").is_ok());
    let err = check_source("struct A { C c } void main() {}").unwrap_err();
    assert!(err.message.contains("unknown type `C`"));
}

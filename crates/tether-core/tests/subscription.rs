//! Tests for the subscription protocol between objects and pointers
//!
//! Counts are only recorded in checked builds, so most assertions compare
//! against `expected(n)`, which is `n` in checked builds and `0` otherwise.

#![allow(unsafe_code)] // `Tracked` is an unsafe trait

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::pin::{pin, Pin};

use tether_core::{
    make_subscription, set_violation_action, Subscribable, SubscriptionError, SubscriptionPointer, Tracked,
    ViolationAction, CHECKED,
};

#[derive(Default)]
struct Account
{
    balance: i64,
    subscribable: Subscribable,
}

// SAFETY: the subscribable is a plain field and `Account` is not `Unpin`.
unsafe impl Tracked for Account
{
    fn subscribable(&self) -> &Subscribable
    {
        &self.subscribable
    }
}

fn expected(count: usize) -> usize
{
    if CHECKED {
        count
    } else {
        0
    }
}

fn count(account: &Account) -> usize
{
    account.subscribable().subscriber_count()
}

fn labels(account: &Account) -> Vec<String>
{
    account.subscribable().subscriber_labels()
}

/// Run `f`, which must raise a violation, and return the raised error.
fn raised(f: impl FnOnce()) -> SubscriptionError
{
    set_violation_action(ViolationAction::Panic);
    let payload: Box<dyn Any + Send> = panic::catch_unwind(AssertUnwindSafe(f)).expect_err("nothing was raised");
    *payload.downcast::<SubscriptionError>().expect("payload is not a SubscriptionError")
}

#[test]
fn test_loan_scenario()
{
    let account = pin!(Account::default());
    assert_eq!(count(&account), 0);

    let mut first = SubscriptionPointer::bound("loanA", account.as_ref());
    assert_eq!(count(&account), expected(1));

    let second = SubscriptionPointer::bound("loanB", account.as_ref());
    assert_eq!(count(&account), expected(2));
    if CHECKED {
        assert_eq!(labels(&account), vec!["loanB", "loanA"]);
    }

    first.reset();
    assert_eq!(count(&account), expected(1));
    if CHECKED {
        assert_eq!(labels(&account), vec!["loanB"]);
    }

    drop(second);
    drop(first);
    assert_eq!(count(&account), 0);
}

#[test]
fn test_destroy_without_observers_is_silent()
{
    let account = Box::pin(Account::default());
    let pointer = SubscriptionPointer::bound("short", account.as_ref());
    drop(pointer);
    drop(account);
}

#[test]
fn test_destroy_observed_raises_still_used()
{
    if !CHECKED {
        return;
    }

    let account = Box::pin(Account::default());
    let pointer = SubscriptionPointer::bound("x", account.as_ref());

    let error = raised(move || drop(account));
    assert_eq!(
        error,
        SubscriptionError::StillUsed {
            type_name: std::any::type_name::<Account>().to_string(),
            count: 1,
            subscribers: vec!["x".to_string()],
        }
    );

    // Unsubscribing from a destroyed target is still allowed
    drop(pointer);
}

#[test]
fn test_still_used_lists_newest_first()
{
    if !CHECKED {
        return;
    }

    let account = Box::pin(Account::default());
    let pointers: Vec<_> = ["p1", "p2", "p3"]
        .iter()
        .map(|label| SubscriptionPointer::bound(*label, account.as_ref()))
        .collect();

    let error = raised(move || drop(account));
    match &error {
        SubscriptionError::StillUsed { count, subscribers, .. } => {
            assert_eq!(*count, 3);
            assert_eq!(subscribers, &vec!["p3", "p2", "p1"]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(error.to_string().ends_with("(from new to old): p3 p2 p1"));

    drop(pointers);
}

#[test]
fn test_dereference_after_target_destroyed()
{
    if !CHECKED {
        return;
    }

    let account = Box::pin(Account {
        balance: 7,
        ..Account::default()
    });
    let pointer = SubscriptionPointer::bound("late", account.as_ref());
    assert_eq!(pointer.balance, 7);

    raised(move || drop(account));

    let error = raised(|| {
        let _ = pointer.get();
    });
    assert_eq!(error.as_label(), "dangling_target");
    match error {
        SubscriptionError::DanglingTarget { label, type_name } => {
            assert_eq!(label, "late");
            assert!(type_name.ends_with("Account"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    drop(pointer);
}

#[test]
fn test_empty_dereference_raises()
{
    let pointer: SubscriptionPointer<Account> = SubscriptionPointer::new("nowhere");
    let error = raised(|| {
        let _balance = pointer.balance;
    });
    assert_eq!(
        error,
        SubscriptionError::EmptyDereference {
            label: "nowhere".to_string()
        }
    );
}

#[test]
fn test_reset_moves_subscription()
{
    let a = pin!(Account::default());
    let b = pin!(Account::default());
    let _other = SubscriptionPointer::bound("other", a.as_ref());

    let mut pointer = SubscriptionPointer::bound("a", a.as_ref());
    assert_eq!((count(&a), count(&b)), (expected(2), 0));

    pointer.reset_to(b.as_ref());
    assert_eq!((count(&a), count(&b)), (expected(1), expected(1)));
    if CHECKED {
        assert_eq!(labels(&a), vec!["other"]);
        assert_eq!(labels(&b), vec!["a"]);
    }
    assert_eq!(pointer.label(), "a");
}

#[test]
fn test_same_label_counts_independently()
{
    let account = pin!(Account::default());
    let first = SubscriptionPointer::bound("twin", account.as_ref());
    let second = SubscriptionPointer::bound("twin", account.as_ref());
    assert_eq!(count(&account), expected(2));

    drop(first);
    assert_eq!(count(&account), expected(1));
    if CHECKED {
        assert_eq!(labels(&account), vec!["twin"]);
    }
    assert!(second.is_bound());

    drop(second);
    assert_eq!(count(&account), 0);
}

#[test]
fn test_clone_is_independent()
{
    let account = pin!(Account {
        balance: 3,
        ..Account::default()
    });
    let original = SubscriptionPointer::bound("loan", account.as_ref());
    let copy = original.clone();

    assert_eq!(count(&account), expected(2));
    assert_eq!(copy, original);
    assert_eq!(copy.label(), "loan");

    drop(original);
    assert_eq!(count(&account), expected(1));
    assert_eq!(copy.balance, 3);
}

#[test]
fn test_clone_from_rebinds()
{
    let a = pin!(Account::default());
    let b = pin!(Account::default());
    let source = SubscriptionPointer::bound("src", b.as_ref());
    let mut target = SubscriptionPointer::bound("dst", a.as_ref());

    target.clone_from(&source);
    assert_eq!((count(&a), count(&b)), (0, expected(2)));
    assert_eq!(target.label(), "src");
    assert_eq!(target, source);
}

#[test]
fn test_clone_of_empty_is_empty()
{
    let account = pin!(Account::default());
    let empty: SubscriptionPointer<Account> = SubscriptionPointer::new("idle");
    let copy = empty.clone();
    assert!(copy.is_empty());
    assert_eq!(copy, empty);

    let bound = make_subscription(account.as_ref(), "bound");
    assert_ne!(bound, empty);
}

#[test]
fn test_pointer_move_keeps_registration()
{
    let account = pin!(Account::default());
    let pointer = SubscriptionPointer::bound("moved", account.as_ref());
    let moved = pointer;
    assert_eq!(count(&account), expected(1));

    let mut slots = vec![moved];
    assert_eq!(count(&account), expected(1));
    slots.clear();
    assert_eq!(count(&account), 0);
}

#[test]
fn test_assignment_releases_previous_target()
{
    let a = pin!(Account::default());
    let b = pin!(Account::default());
    let mut pointer = SubscriptionPointer::bound("p", a.as_ref());
    assert_eq!(count(&a), expected(1));

    pointer = SubscriptionPointer::bound("q", b.as_ref());
    assert_eq!((count(&a), count(&b)), (0, expected(1)));
    assert_eq!(pointer.label(), "q");
}

#[test]
fn test_copying_subscribable_starts_empty()
{
    let account = pin!(Account::default());
    let _pointer = SubscriptionPointer::bound("watch", account.as_ref());

    let copy = account.subscribable().clone();
    assert_eq!(copy.subscriber_count(), 0);
    assert_eq!(count(&account), expected(1));
}

#[test]
fn test_transfer_with_observers_raises()
{
    if !CHECKED {
        return;
    }

    let mut source = pin!(Subscribable::new());
    let pointer = SubscriptionPointer::bound("held", source.as_ref());

    let error = raised(|| {
        let _ = source.as_mut().transfer();
    });
    assert_eq!(error.as_label(), "still_used");
    assert_eq!(source.subscriber_count(), 1);

    drop(pointer);
    assert!(source.check_released().is_ok());
}

/// Keeps its registry on the heap, which `Tracked` forbids.
struct Boxed
{
    subscribable: Box<Subscribable>,
}

// SAFETY: not upheld. The registry lives outside the object and `Boxed` is
// `Unpin`; only used to check that binding rejects it.
unsafe impl Tracked for Boxed
{
    fn subscribable(&self) -> &Subscribable
    {
        &self.subscribable
    }
}

#[test]
fn test_bind_rejects_registry_outside_target()
{
    if !CHECKED {
        return;
    }

    let target = Boxed {
        subscribable: Box::default(),
    };
    let error = raised(|| {
        let _pointer = SubscriptionPointer::bound("outside", Pin::new(&target));
    });
    assert_eq!(error.as_label(), "detached_registry");
    match error {
        SubscriptionError::DetachedRegistry { label, type_name } => {
            assert_eq!(label, "outside");
            assert!(type_name.ends_with("Boxed"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(target.subscribable.subscriber_count(), 0);
}

trait Shape: Tracked
{
    fn area(&self) -> f64;
}

#[derive(Default)]
struct Square
{
    side: f64,
    subscribable: Subscribable,
}

// SAFETY: the subscribable is a plain field and `Square` is not `Unpin`.
unsafe impl Tracked for Square
{
    fn subscribable(&self) -> &Subscribable
    {
        &self.subscribable
    }
}

impl Shape for Square
{
    fn area(&self) -> f64
    {
        self.side * self.side
    }
}

fn as_shape(square: Pin<&Square>) -> Pin<&(dyn Shape + 'static)>
{
    square
}

#[test]
fn test_convert_to_trait_object()
{
    let square = pin!(Square {
        side: 3.0,
        ..Square::default()
    });
    let concrete = SubscriptionPointer::bound("sq", square.as_ref());
    let shape: SubscriptionPointer<dyn Shape> = concrete.convert(as_shape);

    assert!((shape.area() - 9.0).abs() < f64::EPSILON);
    assert_eq!(shape.label(), "sq");
    assert_eq!(square.subscribable().subscriber_count(), expected(2));

    drop(concrete);
    assert_eq!(square.subscribable().subscriber_count(), expected(1));
}

#[test]
fn test_type_name_reports_concrete_type()
{
    let square = pin!(Square::default());
    let shape: SubscriptionPointer<dyn Shape> = SubscriptionPointer::bound("dyn", as_shape(square.as_ref()));

    assert_eq!(shape.type_label(), std::any::type_name::<Square>());
    if CHECKED {
        assert_eq!(square.subscribable().type_name(), std::any::type_name::<Square>());
    }
}

#[test]
fn test_mixed_operations_keep_count_consistent()
{
    let a = pin!(Account::default());
    let b = pin!(Account::default());

    let mut pointers: Vec<SubscriptionPointer<Account>> = (0..6)
        .map(|i| SubscriptionPointer::new(format!("p{i}")))
        .collect();

    for (i, pointer) in pointers.iter_mut().enumerate() {
        let target = if i % 2 == 0 { a.as_ref() } else { b.as_ref() };
        pointer.reset_to(target);
    }
    assert_eq!((count(&a), count(&b)), (expected(3), expected(3)));

    pointers[1].reset_to(a.as_ref());
    pointers[2].reset();
    pointers.push(pointers[0].clone());
    pointers.swap_remove(3);

    let bound_to = |target: &Account| {
        pointers
            .iter()
            .filter(|pointer| pointer.get().is_some_and(|t| std::ptr::eq(t, target)))
            .count()
    };
    assert_eq!(count(&a), expected(bound_to(&a)));
    assert_eq!(count(&b), expected(bound_to(&b)));
}

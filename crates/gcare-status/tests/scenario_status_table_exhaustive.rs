//! Scenario: the status engine over its whole 7 × 3 input domain.
//!
//! # Invariants under test
//! - `is_valid_status_pair` agrees with the published pair table on all 21 pairs.
//! - Offered order moves are graph neighbours filtered by the whitelist.
//! - Terminal statuses offer nothing.
//! - A paid order can never be canceled, from any status.
//! - Booked/Pending -> Processing is refused with a message naming `Paid`.

use gcare_schemas::{OrderStatus, PaymentStatus, Role};
use gcare_status::{
    allowed_order_transitions, available_actions, available_order_statuses,
    available_payment_statuses, can_transition_order_status, is_valid_status_pair,
    validate_status_update,
};

use OrderStatus as O;
use PaymentStatus as P;

/// The published table, written out independently of the crate's `match`.
const PAIR_TABLE: &[(OrderStatus, &[PaymentStatus])] = &[
    (O::Booked, &[P::Pending]),
    (O::Accepted, &[P::Pending, P::Paid]),
    (O::Processing, &[P::Paid]),
    (O::SpecimenCollected, &[P::Paid]),
    (O::Testing, &[P::Paid]),
    (O::Completed, &[P::Paid]),
    (O::Canceled, &[P::Pending, P::Paid, P::Failed]),
];

fn table_allows(o: OrderStatus, p: PaymentStatus) -> bool {
    PAIR_TABLE
        .iter()
        .find(|(order, _)| *order == o)
        .map(|(_, set)| set.contains(&p))
        .unwrap_or(false)
}

#[test]
fn whitelist_matches_table_on_all_21_pairs() {
    let mut accepted = 0;
    for o in OrderStatus::ALL {
        for p in PaymentStatus::ALL {
            assert_eq!(
                is_valid_status_pair(o, p),
                table_allows(o, p),
                "pair {o}/{p}"
            );
            if is_valid_status_pair(o, p) {
                accepted += 1;
            }
        }
    }
    assert_eq!(accepted, 10, "table lists exactly 10 legal pairs");
}

#[test]
fn offered_order_moves_are_filtered_graph_neighbours() {
    for o in OrderStatus::ALL {
        for p in PaymentStatus::ALL {
            let offered = available_order_statuses(o, p);
            let neighbours = allowed_order_transitions(o);
            for next in &offered {
                assert!(neighbours.contains(next), "{o}/{p} offered non-neighbour {next}");
                assert!(table_allows(*next, p), "{o}/{p} offered {next} incompatible with {p}");
            }
            for next in neighbours {
                let expected = table_allows(*next, p)
                    && !(*next == O::Canceled && p == P::Paid);
                assert_eq!(offered.contains(next), expected, "{o}/{p} -> {next}");
            }
        }
    }
}

#[test]
fn terminal_statuses_offer_no_moves() {
    for p in PaymentStatus::ALL {
        assert!(available_order_statuses(O::Completed, p).is_empty());
        assert!(available_order_statuses(O::Canceled, p).is_empty());
    }
    for o in OrderStatus::ALL {
        assert!(available_payment_statuses(P::Paid, o).is_empty());
    }
}

#[test]
fn paid_order_is_never_cancelable() {
    for o in OrderStatus::ALL {
        assert!(
            !can_transition_order_status(o, O::Canceled, P::Paid),
            "{o}/Paid -> Canceled must be refused"
        );
        for role in Role::ALL {
            assert!(!available_actions(o, P::Paid, role).can_cancel);
        }
    }
}

#[test]
fn booked_to_processing_with_pending_payment_names_paid() {
    let check = validate_status_update(O::Booked, P::Pending, Some(O::Processing), None);
    assert!(!check.valid);
    assert!(
        check
            .errors
            .iter()
            .any(|e| e.contains("Processing") && e.contains("Paid")),
        "expected a message saying Processing requires Paid, got {:?}",
        check.errors
    );
}

#[test]
fn every_legal_update_lands_on_a_whitelisted_pair() {
    for o in OrderStatus::ALL {
        for p in PaymentStatus::ALL {
            for no in OrderStatus::ALL.map(Some).into_iter().chain([None]) {
                for np in PaymentStatus::ALL.map(Some).into_iter().chain([None]) {
                    let check = validate_status_update(o, p, no, np);
                    if check.valid {
                        let ro = no.unwrap_or(o);
                        let rp = np.unwrap_or(p);
                        assert!(
                            is_valid_status_pair(ro, rp) || (ro == o && rp == p),
                            "{o}/{p} -> {ro}/{rp} accepted"
                        );
                    } else {
                        assert!(!check.errors.is_empty());
                    }
                }
            }
        }
    }
}

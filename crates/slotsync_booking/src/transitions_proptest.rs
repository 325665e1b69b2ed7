use crate::transitions::{apply, BookingEvent, Transition};
use proptest::prelude::*;
use slotsync_db::{BookingState, BookingStatus, PaymentStatus};

fn arb_event() -> impl Strategy<Value = BookingEvent> {
    prop_oneof![
        Just(BookingEvent::ProviderConfirmed),
        Just(BookingEvent::ProviderCanceled),
        Just(BookingEvent::ProviderNoShow),
        Just(BookingEvent::PaymentSucceeded),
        Just(BookingEvent::PaymentFailed),
        Just(BookingEvent::Completed),
    ]
}

fn arb_status() -> impl Strategy<Value = BookingStatus> {
    prop_oneof![
        Just(BookingStatus::Pending),
        Just(BookingStatus::Confirmed),
        Just(BookingStatus::Completed),
        Just(BookingStatus::Canceled),
        Just(BookingStatus::NoShow),
    ]
}

fn arb_payment() -> impl Strategy<Value = PaymentStatus> {
    prop_oneof![
        Just(PaymentStatus::NotRequired),
        Just(PaymentStatus::AwaitingPayment),
        Just(PaymentStatus::Paid),
        Just(PaymentStatus::Failed),
    ]
}

prop_compose! {
    fn arb_state()(status in arb_status(), payment_status in arb_payment(), provider_confirmed in any::<bool>()) -> BookingState {
        BookingState { status, payment_status, provider_confirmed }
    }
}

proptest! {
    #[test]
    fn terminal_states_never_change(state in arb_state(), event in arb_event()) {
        prop_assume!(state.status.is_terminal());
        prop_assert!(!matches!(apply(state, event), Ok(Transition::Apply(_))));
    }

    #[test]
    fn confirmed_always_means_both_halves_of_the_join(state in arb_state(), event in arb_event()) {
        if let Ok(Transition::Apply(next)) = apply(state, event) {
            if next.status == BookingStatus::Confirmed {
                prop_assert!(next.provider_confirmed);
                prop_assert!(next.payment_status.is_settled());
            }
        }
    }

    #[test]
    fn paid_booking_confirms_only_after_payment_and_provider(
        events in proptest::collection::vec(arb_event(), 0..12),
    ) {
        let mut state = BookingState {
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::AwaitingPayment,
            provider_confirmed: false,
        };
        let mut seen_provider = false;
        let mut seen_payment = false;

        for event in events {
            if let Ok(Transition::Apply(next)) = apply(state, event) {
                seen_provider |= event == BookingEvent::ProviderConfirmed;
                seen_payment |= event == BookingEvent::PaymentSucceeded;
                state = next;
            }
            if state.status == BookingStatus::Confirmed {
                prop_assert!(seen_provider && seen_payment);
            }
        }
    }

    #[test]
    fn applying_the_same_event_twice_changes_nothing_more(state in arb_state(), event in arb_event()) {
        if let Ok(Transition::Apply(next)) = apply(state, event) {
            match apply(next, event) {
                Ok(Transition::Unchanged) | Err(_) => {}
                Ok(Transition::Apply(again)) => prop_assert_eq!(again, next),
            }
        }
    }
}

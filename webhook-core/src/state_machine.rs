use crate::types::MessageStatus;

/// Flat set of `(from, to)` pairs a message may transition through. FAILED
/// appears only once here; whether a given FAILED message is terminal is a
/// property of `next_retry`, not of a second status variant (see
/// `is_terminal`).
pub fn allowed_transitions(from: MessageStatus) -> &'static [MessageStatus] {
    match from {
        MessageStatus::Pending => &[MessageStatus::Processing, MessageStatus::Cancelled],
        MessageStatus::Processing => &[
            MessageStatus::Delivered,
            MessageStatus::Failed,
            MessageStatus::Cancelled,
        ],
        // FAILED can only become PROCESSING again when it was scheduled for
        // retry; the caller (Retry Scheduler) already checked `next_retry`
        // via `markProcessing`'s conditional update before relying on this.
        MessageStatus::Failed => &[MessageStatus::Processing, MessageStatus::Cancelled],
        MessageStatus::Delivered | MessageStatus::Cancelled => &[],
    }
}

pub fn can_transition(from: MessageStatus, to: MessageStatus) -> bool {
    if from == to {
        return false;
    }
    allowed_transitions(from).contains(&to)
}

pub fn apply_transition(from: MessageStatus, to: MessageStatus) -> Result<MessageStatus, String> {
    if !can_transition(from, to) {
        return Err(format!("invalid transition: {from:?} -> {to:?}"));
    }
    Ok(to)
}

/// A message is terminal once it reaches DELIVERED, CANCELLED, or FAILED
/// with no retry scheduled (`next_retry = None`). Unlike the flat transition
/// table, this also needs the value of `next_retry`.
pub fn is_terminal(status: MessageStatus, next_retry: Option<f64>) -> bool {
    match status {
        MessageStatus::Delivered | MessageStatus::Cancelled => true,
        MessageStatus::Failed => next_retry.is_none(),
        MessageStatus::Pending | MessageStatus::Processing => false,
    }
}

/// Whether `markProcessing` may claim a message currently in `status`: only
/// PENDING, or FAILED-due-for-retry (checked by the caller via `next_retry`
/// and the retry-time comparison, not here).
pub fn can_claim_for_processing(status: MessageStatus) -> bool {
    matches!(status, MessageStatus::Pending | MessageStatus::Failed)
}

/// Whether `cancelMessage` may act on a message currently in `status`:
/// any non-terminal status. DELIVERED is excluded even though it is a
/// distinct terminal status from FAILED-terminal, matching §5's rule that
/// cancellation only targets PENDING|FAILED|PROCESSING.
pub fn can_cancel(status: MessageStatus) -> bool {
    matches!(
        status,
        MessageStatus::Pending | MessageStatus::Processing | MessageStatus::Failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use MessageStatus::*;

    #[test]
    fn pending_to_processing_is_valid() {
        assert!(can_transition(Pending, Processing));
    }

    #[test]
    fn pending_to_cancelled_is_valid() {
        assert!(can_transition(Pending, Cancelled));
    }

    #[test]
    fn pending_to_delivered_is_invalid() {
        assert!(!can_transition(Pending, Delivered));
    }

    #[test]
    fn processing_to_delivered_is_valid() {
        assert!(can_transition(Processing, Delivered));
    }

    #[test]
    fn processing_to_failed_is_valid() {
        assert!(can_transition(Processing, Failed));
    }

    #[test]
    fn processing_to_cancelled_is_valid() {
        assert!(can_transition(Processing, Cancelled));
    }

    #[test]
    fn processing_to_pending_is_invalid() {
        assert!(!can_transition(Processing, Pending));
    }

    #[test]
    fn failed_to_processing_is_valid_for_retry() {
        assert!(can_transition(Failed, Processing));
    }

    #[test]
    fn failed_to_cancelled_is_valid() {
        assert!(can_transition(Failed, Cancelled));
    }

    #[test]
    fn failed_to_delivered_is_invalid() {
        assert!(!can_transition(Failed, Delivered));
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        assert!(allowed_transitions(Delivered).is_empty());
        assert!(allowed_transitions(Cancelled).is_empty());
    }

    #[test]
    fn same_status_transition_is_invalid() {
        for s in [Pending, Processing, Delivered, Failed, Cancelled] {
            assert!(!can_transition(s, s));
        }
    }

    #[test]
    fn apply_transition_success() {
        assert_eq!(apply_transition(Pending, Processing).unwrap(), Processing);
    }

    #[test]
    fn apply_transition_failure_message() {
        let err = apply_transition(Pending, Delivered).unwrap_err();
        assert!(err.contains("invalid transition"));
    }

    #[test]
    fn is_terminal_delivered_and_cancelled() {
        assert!(is_terminal(Delivered, None));
        assert!(is_terminal(Cancelled, None));
    }

    #[test]
    fn is_terminal_failed_depends_on_next_retry() {
        assert!(is_terminal(Failed, None));
        assert!(!is_terminal(Failed, Some(123.0)));
    }

    #[test]
    fn is_terminal_pending_and_processing_are_false() {
        assert!(!is_terminal(Pending, None));
        assert!(!is_terminal(Processing, None));
    }

    #[test]
    fn can_claim_for_processing_only_pending_or_failed() {
        assert!(can_claim_for_processing(Pending));
        assert!(can_claim_for_processing(Failed));
        assert!(!can_claim_for_processing(Processing));
        assert!(!can_claim_for_processing(Delivered));
        assert!(!can_claim_for_processing(Cancelled));
    }

    #[test]
    fn can_cancel_excludes_terminal_states() {
        assert!(can_cancel(Pending));
        assert!(can_cancel(Processing));
        assert!(can_cancel(Failed));
        assert!(!can_cancel(Delivered));
        assert!(!can_cancel(Cancelled));
    }
}

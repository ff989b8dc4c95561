//! Property-based tests for command boundary tracking

use proptest::prelude::*;
use shellgate::{BoundaryResult, CommandBoundaryState};

/// Feed a fragment and return the last reported command, if any
fn last_command(state: &mut CommandBoundaryState, fragment: &str) -> Option<String> {
    match state.observe(fragment) {
        BoundaryResult::CommandReady(cmd) => Some(cmd),
        BoundaryResult::Accumulating => None,
    }
}

proptest! {
    #[test]
    fn test_observe_never_panics_on_unicode(s in "\\PC*") {
        let mut state = CommandBoundaryState::new();
        let _ = state.observe(&s);
    }

    #[test]
    fn test_observe_never_panics_on_byte_soup(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
        let mut state = CommandBoundaryState::new();
        let soup = String::from_utf8_lossy(&bytes).into_owned();
        let _ = state.observe(&soup);
    }

    #[test]
    fn test_buffer_holds_only_printable_ascii(s in "\\PC*") {
        let mut state = CommandBoundaryState::new();
        state.observe(&s);
        prop_assert!(state
            .buffer()
            .bytes()
            .all(|b| (0x20..0x7F).contains(&b)));
    }

    #[test]
    fn test_printable_line_round_trips(cmd in "[ -~]{0,60}") {
        let mut state = CommandBoundaryState::new();
        let input = format!("{}\n", cmd);
        prop_assert_eq!(
            state.observe(&input),
            BoundaryResult::CommandReady(cmd)
        );
        prop_assert!(state.is_empty());
    }

    #[test]
    fn test_crlf_reports_one_boundary_and_leaves_next_line_alone(cmd in "[ -~]{0,40}") {
        let mut state = CommandBoundaryState::new();
        let input = format!("{}\r\n", cmd);
        prop_assert_eq!(
            state.observe(&input),
            BoundaryResult::CommandReady(cmd)
        );

        // A phantom second boundary would wipe whatever comes next
        state.observe("x");
        prop_assert_eq!(state.buffer(), "x");
    }

    #[test]
    fn test_backspaces_trim_from_the_right(
        cmd in "[a-z ]{0,30}",
        pops in 0usize..40,
    ) {
        let mut state = CommandBoundaryState::new();
        state.observe(&cmd);
        state.observe(&"\x7f".repeat(pops));

        let kept = cmd.len().saturating_sub(pops);
        prop_assert_eq!(state.buffer(), &cmd[..kept]);
    }

    #[test]
    fn test_terminators_only_never_yield_a_command(n in 1usize..20) {
        let mut state = CommandBoundaryState::new();
        let result = state.observe(&"\n".repeat(n));
        prop_assert_eq!(result.command(), None);
        prop_assert!(state.is_empty());
    }

    #[test]
    fn test_fragmentation_does_not_change_final_state(
        s in "[ -~\r\n\x08\x7f]{0,120}",
        split in 0usize..121,
    ) {
        let mut whole = CommandBoundaryState::new();
        let whole_last = last_command(&mut whole, &s);

        let mut parts = CommandBoundaryState::new();
        let cut = split.min(s.len());
        let first = last_command(&mut parts, &s[..cut]);
        let second = last_command(&mut parts, &s[cut..]);
        let parts_last = second.or(first);

        // Where the fragment boundary falls must not change what ends
        // up buffered, nor the last command reported
        prop_assert_eq!(whole.buffer(), parts.buffer());
        prop_assert_eq!(whole_last, parts_last);
    }

    #[test]
    fn test_char_by_char_matches_bulk(s in "[ -~\r\n\x08\x7f]{0,80}") {
        let mut bulk = CommandBoundaryState::new();
        let bulk_last = last_command(&mut bulk, &s);

        let mut keyed = CommandBoundaryState::new();
        let mut keyed_last = None;
        for ch in s.chars() {
            if let Some(cmd) = last_command(&mut keyed, &ch.to_string()) {
                keyed_last = Some(cmd);
            }
        }

        prop_assert_eq!(bulk.buffer(), keyed.buffer());
        prop_assert_eq!(bulk_last, keyed_last);
    }

    #[test]
    fn test_reported_commands_are_printable(s in "\\PC*") {
        let mut state = CommandBoundaryState::new();
        if let Some(cmd) = last_command(&mut state, &s) {
            prop_assert!(cmd.bytes().all(|b| (0x20..0x7F).contains(&b)));
        }
    }
}

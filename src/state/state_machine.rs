use crate::state::room::UserState;

/// Validate a member state transition requested by a client.
///
/// Clients may always return to `Idle`, ready up from `Idle`, report a
/// completed load, or report a finished play. Every state the server drives
/// the match through (`WaitingForLoad`, `Playing`, `Results`) is reserved to
/// the server; a client asking for one of those is rejected no matter where
/// it currently is.
pub fn validate_client_transition(
    from: UserState,
    to: UserState,
) -> Result<(), (UserState, UserState)> {
    use UserState::*;

    match (from, to) {
        (_, Idle) => Ok(()),
        (Idle, Ready) => Ok(()),
        (WaitingForLoad, Loaded) => Ok(()),
        (Playing, FinishedPlay) => Ok(()),
        (from, to) => Err((from, to)),
    }
}

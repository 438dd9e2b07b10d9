//! Observable `{loading, data, error}` state of one query operation.

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    pub loading: bool,
    pub data: Option<T>,
    pub error: Option<ClientError>,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            loading: false,
            data: None,
            error: None,
        }
    }
}

impl<T> OperationState<T> {
    pub fn phase(&self) -> Phase {
        match (self.loading, &self.data, &self.error) {
            (true, _, _) => Phase::Loading,
            (false, _, Some(_)) => Phase::Failure,
            (false, Some(_), None) => Phase::Success,
            (false, None, None) => Phase::Idle,
        }
    }
}

/// `Idle -> Loading -> {Success, Failure}`; invoking again from any phase
/// re-enters `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Success,
    Failure,
}

/// Result of one invocation. Exactly one of `data` / `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome<T> {
    pub data: Option<T>,
    pub error: Option<ClientError>,
}

impl<T> QueryOutcome<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: ClientError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, ClientError> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            // Unreachable through the constructors above.
            (None, None) => Err(ClientError::Cancelled),
        }
    }
}

impl<T> From<Result<T, ClientError>> for QueryOutcome<T> {
    fn from(result: Result<T, ClientError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(error) => Self::failure(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn phases_follow_fields() {
        let mut state: OperationState<u32> = OperationState::default();
        assert_eq!(state.phase(), Phase::Idle);

        state.loading = true;
        assert_eq!(state.phase(), Phase::Loading);

        state.loading = false;
        state.data = Some(1);
        assert_eq!(state.phase(), Phase::Success);

        state.data = None;
        state.error = Some(TransportError::status(500, None).into());
        assert_eq!(state.phase(), Phase::Failure);
    }

    #[test]
    fn outcome_converts_to_result() {
        assert_eq!(QueryOutcome::success(3).into_result(), Ok(3));

        let outcome: QueryOutcome<u32> = QueryOutcome::failure(ClientError::Cancelled);
        assert!(!outcome.is_success());
        assert_eq!(outcome.into_result(), Err(ClientError::Cancelled));
    }
}

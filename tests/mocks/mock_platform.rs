//! Mock Platform Client for Testing
//!
//! Scripts responses for every PlatformClient call and records the calls
//! made, so tests can assert on exactly what the orchestration core did.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use roster_core::client::{ClientError, GrantError, MemberRecord, PlatformClient, SignInOutcome};
use roster_core::orchestration::types::{Destination, Identity, Target};
use roster_core::session::{AuthorizationState, SessionAuth};

/// Mock state for tracking calls and simulating behavior
#[derive(Debug, Default, Clone)]
pub struct MockPlatformState {
    pub connect_calls: usize,
    pub resolve_calls: Vec<String>,
    pub list_calls: usize,
    pub grant_calls: Vec<String>,
    pub probe_calls: usize,
    pub code_requests: Vec<String>,
    pub sign_in_codes: Vec<String>,
    pub sign_in_passwords: Vec<String>,
}

/// Mock platform implementation for testing
pub struct MockPlatform {
    state: Arc<Mutex<MockPlatformState>>,
    authorization: AuthorizationState,
    connect_failure: Option<String>,
    resolution: Result<i64, String>,
    members: Vec<MemberRecord>,
    listing_failure: Option<String>,
    full_pages_forever: bool,
    grant_failures: HashMap<String, GrantError>,
    probe_reply: Result<String, String>,
    sign_in_result: Result<SignInOutcome, String>,
    password_result: Result<(), String>,
}

impl MockPlatform {
    /// A healthy platform: authorized session, resolvable destination, no
    /// existing members, every grant succeeds.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockPlatformState::default())),
            authorization: AuthorizationState::Authorized,
            connect_failure: None,
            resolution: Ok(123_456_789),
            members: Vec::new(),
            listing_failure: None,
            full_pages_forever: false,
            grant_failures: HashMap::new(),
            probe_reply: Ok("Good news, no limits are currently applied".to_string()),
            sign_in_result: Ok(SignInOutcome::Completed),
            password_result: Ok(()),
        }
    }

    /// Existing members by handle, with sequential numeric ids
    pub fn with_members(mut self, handles: &[&str]) -> Self {
        self.members = handles
            .iter()
            .enumerate()
            .map(|(i, handle)| MemberRecord {
                id: i as i64 + 1,
                handle: Some((*handle).to_string()),
            })
            .collect();
        self
    }

    pub fn with_member_records(mut self, members: Vec<MemberRecord>) -> Self {
        self.members = members;
        self
    }

    pub fn with_grant_failure(mut self, target: &str, error: GrantError) -> Self {
        self.grant_failures.insert(target.to_string(), error);
        self
    }

    pub fn with_resolution_failure(mut self) -> Self {
        self.resolution = Err("no such destination".to_string());
        self
    }

    pub fn with_listing_failure(mut self) -> Self {
        self.listing_failure = Some("member listing unavailable".to_string());
        self
    }

    /// Simulate a platform that returns full pages forever
    pub fn with_full_pages_forever(mut self) -> Self {
        self.full_pages_forever = true;
        self
    }

    pub fn with_authorization(mut self, state: AuthorizationState) -> Self {
        self.authorization = state;
        self
    }

    pub fn with_connect_failure(mut self) -> Self {
        self.connect_failure = Some("connection refused".to_string());
        self
    }

    pub fn with_probe_failure(mut self) -> Self {
        self.probe_reply = Err("probe timed out".to_string());
        self
    }

    pub fn with_sign_in_result(mut self, result: Result<SignInOutcome, String>) -> Self {
        self.sign_in_result = result;
        self
    }

    #[allow(dead_code)]
    pub fn with_password_failure(mut self) -> Self {
        self.password_result = Err("bad passphrase".to_string());
        self
    }

    /// Get the current state for assertions
    pub fn get_state(&self) -> MockPlatformState {
        self.state.lock().clone()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn connect(&self, _auth: &SessionAuth) -> Result<AuthorizationState, ClientError> {
        self.state.lock().connect_calls += 1;
        match &self.connect_failure {
            Some(reason) => Err(ClientError::Connection(reason.clone())),
            None => Ok(self.authorization),
        }
    }

    async fn resolve_destination(&self, reference: &str) -> Result<i64, ClientError> {
        self.state.lock().resolve_calls.push(reference.to_string());
        match &self.resolution {
            Ok(id) => Ok(*id),
            Err(reason) => Err(ClientError::Resolution {
                reference: reference.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    async fn list_members(
        &self,
        _destination: &Destination,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, ClientError> {
        self.state.lock().list_calls += 1;
        if let Some(reason) = &self.listing_failure {
            return Err(ClientError::Listing(reason.clone()));
        }
        if self.full_pages_forever {
            return Ok((0..limit)
                .map(|i| MemberRecord {
                    id: (offset + i) as i64 + 1,
                    handle: None,
                })
                .collect());
        }
        let end = (offset + limit).min(self.members.len());
        if offset >= self.members.len() {
            return Ok(Vec::new());
        }
        Ok(self.members[offset..end].to_vec())
    }

    async fn grant(&self, _destination: &Destination, target: &Target) -> Result<(), GrantError> {
        self.state.lock().grant_calls.push(target.as_str().to_string());
        match self.grant_failures.get(target.as_str()) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn probe_status(&self, _wait: Duration) -> Result<String, ClientError> {
        self.state.lock().probe_calls += 1;
        match &self.probe_reply {
            Ok(text) => Ok(text.clone()),
            Err(reason) => Err(ClientError::Probe(reason.clone())),
        }
    }

    async fn request_login_code(&self, contact: &str) -> Result<(), ClientError> {
        self.state.lock().code_requests.push(contact.to_string());
        Ok(())
    }

    async fn sign_in(&self, code: &str) -> Result<SignInOutcome, ClientError> {
        self.state.lock().sign_in_codes.push(code.to_string());
        match &self.sign_in_result {
            Ok(outcome) => Ok(*outcome),
            Err(reason) => Err(ClientError::SignIn(reason.clone())),
        }
    }

    async fn sign_in_with_password(&self, password: &str) -> Result<(), ClientError> {
        self.state.lock().sign_in_passwords.push(password.to_string());
        match &self.password_result {
            Ok(()) => Ok(()),
            Err(reason) => Err(ClientError::SignIn(reason.clone())),
        }
    }
}

/// Identity fixture with an unverified authorization state
pub fn test_identity(label: &str) -> Identity {
    Identity {
        label: label.to_string(),
        auth: SessionAuth {
            label: label.to_string(),
            material_path: PathBuf::from(format!("sessions/{label}.session")),
        },
        authorization: AuthorizationState::Unknown,
    }
}

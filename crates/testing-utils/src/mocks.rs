//! Mock implementations for service traits

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use jobcomp_domain::IdentityService;
use jobcomp_errors::{JobCompError, JobCompResult};

/// In-memory identity service that records how many lookups were made
#[derive(Debug, Default)]
pub struct MockIdentityService {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
    fail: bool,
    user_lookups: AtomicUsize,
    group_lookups: AtomicUsize,
}

impl MockIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, uid: u32, name: &str) -> Self {
        self.users.insert(uid, name.to_string());
        self
    }

    pub fn with_group(mut self, gid: u32, name: &str) -> Self {
        self.groups.insert(gid, name.to_string());
        self
    }

    /// Every lookup returns an error
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    pub fn group_lookups(&self) -> usize {
        self.group_lookups.load(Ordering::SeqCst)
    }
}

impl IdentityService for MockIdentityService {
    fn user_name(&self, uid: u32) -> JobCompResult<Option<String>> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(JobCompError::IdentityLookup {
                id: uid,
                message: "identity service unavailable".to_string(),
            });
        }
        Ok(self.users.get(&uid).cloned())
    }

    fn group_name(&self, gid: u32) -> JobCompResult<Option<String>> {
        self.group_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(JobCompError::IdentityLookup {
                id: gid,
                message: "identity service unavailable".to_string(),
            });
        }
        Ok(self.groups.get(&gid).cloned())
    }
}

//! 用户名/组名解析
//!
//! 每个解析器只缓存最近一次查询结果（单槽缓存），所有调用都要获取同一把锁。
//! 完成事件通常成批出现且属于同一用户，单槽已经足够。

use std::sync::{Arc, Mutex, PoisonError};

use jobcomp_domain::IdentityService;
use jobcomp_errors::JobCompResult;
use tracing::{debug, warn};

/// 身份查询失败时使用的名称
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone)]
struct NameCacheEntry {
    id: u32,
    name: String,
}

/// 单槽名称缓存，按ID不匹配淘汰，不按时间淘汰
#[derive(Debug, Default)]
struct IdentityCache {
    slot: Mutex<Option<NameCacheEntry>>,
}

impl IdentityCache {
    fn resolve_with<F>(&self, id: u32, kind: &'static str, lookup: F) -> String
    where
        F: FnOnce(u32) -> JobCompResult<Option<String>>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = slot.as_ref() {
            if entry.id == id {
                return entry.name.clone();
            }
        }

        let name = match lookup(id) {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => {
                debug!("{} {} 不存在，使用 {}", kind, id, UNKNOWN_NAME);
                UNKNOWN_NAME.to_string()
            }
            Err(e) => {
                warn!(error = %e, "{} {} 查询失败，使用 {}", kind, id, UNKNOWN_NAME);
                UNKNOWN_NAME.to_string()
            }
        };

        *slot = Some(NameCacheEntry {
            id,
            name: name.clone(),
        });
        name
    }
}

/// 用户ID到用户名的解析器，从不失败
pub struct UserNameResolver {
    service: Arc<dyn IdentityService>,
    cache: IdentityCache,
}

impl UserNameResolver {
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self {
            service,
            cache: IdentityCache::default(),
        }
    }

    /// 返回名称的独立副本，调用方修改不会影响缓存
    pub fn resolve(&self, uid: u32) -> String {
        self.cache
            .resolve_with(uid, "用户", |uid| self.service.user_name(uid))
    }
}

/// 组ID到组名的解析器
pub struct GroupNameResolver {
    service: Arc<dyn IdentityService>,
    cache: IdentityCache,
}

impl GroupNameResolver {
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self {
            service,
            cache: IdentityCache::default(),
        }
    }

    pub fn resolve(&self, gid: u32) -> String {
        self.cache
            .resolve_with(gid, "组", |gid| self.service.group_name(gid))
    }
}

/// 基于系统 passwd/group 数据库的身份服务
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentityService;

#[cfg(unix)]
impl IdentityService for SystemIdentityService {
    fn user_name(&self, uid: u32) -> JobCompResult<Option<String>> {
        use nix::unistd::{Uid, User};

        User::from_uid(Uid::from_raw(uid))
            .map(|user| user.map(|u| u.name))
            .map_err(|e| jobcomp_errors::JobCompError::IdentityLookup {
                id: uid,
                message: e.to_string(),
            })
    }

    fn group_name(&self, gid: u32) -> JobCompResult<Option<String>> {
        use nix::unistd::{Gid, Group};

        Group::from_gid(Gid::from_raw(gid))
            .map(|group| group.map(|g| g.name))
            .map_err(|e| jobcomp_errors::JobCompError::IdentityLookup {
                id: gid,
                message: e.to_string(),
            })
    }
}

#[cfg(not(unix))]
impl IdentityService for SystemIdentityService {
    fn user_name(&self, _uid: u32) -> JobCompResult<Option<String>> {
        Ok(None)
    }

    fn group_name(&self, _gid: u32) -> JobCompResult<Option<String>> {
        Ok(None)
    }
}

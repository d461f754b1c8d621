use jobcomp_errors::JobCompResult;

/// 平台身份服务，按数值ID查询用户名或组名
///
/// `Ok(None)` 表示不存在该身份，`Err` 表示查询本身失败。
pub trait IdentityService: Send + Sync {
    fn user_name(&self, uid: u32) -> JobCompResult<Option<String>>;
    fn group_name(&self, gid: u32) -> JobCompResult<Option<String>>;
}

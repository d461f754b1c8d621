use std::sync::Arc;

use jobcomp_domain::{
    sprint_topology, IdentityService, JobCompletionRecord, JobRecord, PlatformFields,
    PlatformProfile, TimeLimit, TopologyField, TopologyFields, TopologyInfo,
};
use tracing::{debug, instrument};

use crate::identity::{GroupNameResolver, UserNameResolver};

/// 把内存中的作业对象投影为作业完成记录
pub struct RecordBuilder {
    profile: PlatformProfile,
    users: UserNameResolver,
    groups: GroupNameResolver,
}

impl RecordBuilder {
    pub fn new(profile: PlatformProfile, identity: Arc<dyn IdentityService>) -> Self {
        Self {
            profile,
            users: UserNameResolver::new(identity.clone()),
            groups: GroupNameResolver::new(identity),
        }
    }

    pub fn profile(&self) -> PlatformProfile {
        self.profile
    }

    #[instrument(skip(self, job), fields(job_id = job.job_id, raw_state = job.job_state.raw()))]
    pub fn build(&self, job: &JobRecord) -> JobCompletionRecord {
        // 记录时作业通常仍处于 COMPLETING，去掉该标志得到最终状态
        let final_state = job.job_state.without_completing();

        let platform = match self.profile {
            PlatformProfile::Base => PlatformFields::Base,
            PlatformProfile::Topology => {
                PlatformFields::Topology(topology_fields(job.topology.as_ref()))
            }
        };

        let record = JobCompletionRecord {
            job_id: job.job_id,
            user_id: job.user_id,
            user_name: self.users.resolve(job.user_id),
            group_id: job.group_id,
            group_name: self.groups.resolve(job.group_id),
            name: job.name.clone(),
            final_state,
            partition: job.partition.clone(),
            time_limit: TimeLimit::from_raw(job.time_limit),
            start_time: job.start_time,
            end_time: job.end_time,
            node_list: job.nodes.clone(),
            node_count: job.node_cnt,
            platform,
        };

        debug!(
            state = %record.final_state,
            time_limit = %record.time_limit,
            "构建作业完成记录: {}",
            record.entity_description()
        );
        record
    }
}

fn topology_fields(descriptor: Option<&TopologyInfo>) -> TopologyFields {
    let fallback = TopologyInfo::default();
    let info = descriptor.unwrap_or(&fallback);

    TopologyFields {
        connection: sprint_topology(info, TopologyField::Connection),
        reboot: sprint_topology(info, TopologyField::Reboot),
        rotate: sprint_topology(info, TopologyField::Rotate),
        max_procs: sprint_topology(info, TopologyField::MaxProcs),
        geometry: sprint_topology(info, TopologyField::Geometry),
        start: sprint_topology(info, TopologyField::Start),
        block_id: sprint_topology(info, TopologyField::BlockId),
    }
}

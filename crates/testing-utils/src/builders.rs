//! Test data builders for creating test entities

use jobcomp_domain::{JobRecord, JobState, TopologyInfo};

/// Builder for creating test JobRecord entities
pub struct JobRecordBuilder {
    job: JobRecord,
}

impl JobRecordBuilder {
    pub fn new() -> Self {
        Self {
            job: JobRecord {
                job_id: 1,
                user_id: 1000,
                group_id: 100,
                name: "test_job".to_string(),
                job_state: JobState::COMPLETE.with_completing(),
                partition: "debug".to_string(),
                time_limit: 60,
                start_time: 1_700_000_000,
                end_time: 1_700_003_600,
                nodes: "node1".to_string(),
                node_cnt: 1,
                topology: None,
            },
        }
    }

    pub fn with_job_id(mut self, job_id: u32) -> Self {
        self.job.job_id = job_id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.job.name = name.to_string();
        self
    }

    pub fn with_user(mut self, user_id: u32, group_id: u32) -> Self {
        self.job.user_id = user_id;
        self.job.group_id = group_id;
        self
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.job.job_state = state;
        self
    }

    pub fn with_partition(mut self, partition: &str) -> Self {
        self.job.partition = partition.to_string();
        self
    }

    pub fn with_time_limit(mut self, minutes: u32) -> Self {
        self.job.time_limit = minutes;
        self
    }

    pub fn with_times(mut self, start_time: i64, end_time: i64) -> Self {
        self.job.start_time = start_time;
        self.job.end_time = end_time;
        self
    }

    pub fn with_nodes(mut self, nodes: &str, node_cnt: u32) -> Self {
        self.job.nodes = nodes.to_string();
        self.job.node_cnt = node_cnt;
        self
    }

    pub fn with_topology(mut self, topology: TopologyInfo) -> Self {
        self.job.topology = Some(topology);
        self
    }

    pub fn build(self) -> JobRecord {
        self.job
    }
}

impl Default for JobRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Task descriptions for the game-server scheduler.

use std::sync::Arc;

use adcheck_core::{FailFastReporter, Fatal, Target, CHECKER_FILE};
use serde::{Deserialize, Serialize};

use crate::info::ContractInfo;
use crate::proxy::CheckerProxy;

const CHECKER_TYPE: &str = "gevent";
const ATTACK_DATA_SUFFIX: &str = "_pfr";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDump {
    pub tasks: Vec<TaskEntry>,
}

/// One scheduler task, built from a checker's `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    pub checker: String,
    pub checker_timeout: u64,
    pub checker_type: String,
    pub places: u32,
    pub puts: u32,
    pub gets: u32,
}

impl TaskEntry {
    pub fn new(name: &str, info: &ContractInfo) -> Self {
        let mut checker_type = CHECKER_TYPE.to_string();
        if info.uses_attack_data {
            checker_type.push_str(ATTACK_DATA_SUFFIX);
        }

        Self {
            name: name.to_string(),
            checker: format!("{name}/{CHECKER_FILE}"),
            checker_timeout: info.timeout_secs,
            checker_type,
            places: info.vulnerability_count,
            puts: 1,
            gets: 1,
        }
    }
}

impl TaskDump {
    /// Connect to every target's checker and describe it.
    pub async fn collect(
        targets: &[Target],
        host: &str,
        reporter: &Arc<FailFastReporter>,
    ) -> Result<Self, Fatal> {
        let mut tasks = Vec::with_capacity(targets.len());
        for target in targets {
            let proxy = CheckerProxy::for_target(target, host, reporter).await?;
            tasks.push(TaskEntry::new(proxy.name(), proxy.info()));
        }
        Ok(Self { tasks })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

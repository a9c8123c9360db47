// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::server::ServerDeploymentSpec;
use crate::infrastructure::constants::{
    LABEL_APP, LABEL_GAME, LABEL_MANAGED_BY, LABEL_MANAGED_BY_VALUE, LABEL_PACKAGE,
};
use std::collections::BTreeMap;

pub trait LabeledResourceBuilder {
    fn spec(&self) -> &ServerDeploymentSpec;

    /// Object labels. Game and package let a paused server be resumed
    /// without restating its package.
    fn get_labels(&self) -> BTreeMap<String, String> {
        let spec = self.spec();
        let mut labels = self.get_selector_labels();
        labels.insert(
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_VALUE.to_string(),
        );
        labels.insert(
            LABEL_GAME.to_string(),
            spec.resource_package.game_id.clone(),
        );
        labels.insert(
            LABEL_PACKAGE.to_string(),
            spec.resource_package.package_id.clone(),
        );
        labels
    }

    /// Pod labels, and the Service selector.
    fn get_selector_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_APP.to_string(), self.spec().server_id.clone());
        labels
    }
}

/// Label selector matching every Deployment this tool created.
pub fn managed_by_selector() -> String {
    format!("{}={}", LABEL_MANAGED_BY, LABEL_MANAGED_BY_VALUE)
}

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

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "gameserver-kube";

/// Resource labels
pub const LABEL_APP: &str = "app";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_MANAGED_BY_VALUE: &str = "gameserver-kube";
pub const LABEL_GAME: &str = "gameserver.io/game";
pub const LABEL_PACKAGE: &str = "gameserver.io/package";

/// Node pool reserved for game workloads
pub const NODE_SELECTOR_KEY: &str = "workload";
pub const NODE_SELECTOR_VALUE: &str = "gameserver";

/// Deployment strategy
pub const STRATEGY_TYPE_RECREATE: &str = "Recreate";

/// Service configuration
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";
pub const SERVICE_PORT_NAME: &str = "game";
pub const PROTOCOL_TCP: &str = "TCP";

/// Azure load balancer annotations pinning a static public IP and DNS label
pub const ANNOTATION_LB_RESOURCE_GROUP: &str =
    "service.beta.kubernetes.io/azure-load-balancer-resource-group";
pub const ANNOTATION_PIP_NAME: &str = "service.beta.kubernetes.io/azure-pip-name";
pub const ANNOTATION_DNS_LABEL: &str = "service.beta.kubernetes.io/azure-dns-label-name";
pub const ANNOTATION_IP_ALLOCATION: &str =
    "service.beta.kubernetes.io/azure-load-balancer-ip-allocation-method";
pub const IP_ALLOCATION_STATIC: &str = "static";
pub const PIP_NAME_SUFFIX: &str = "-pip";
pub const DNS_LABEL_SUFFIX: &str = "-dns";
pub const AZURE_DNS_ZONE: &str = "cloudapp.azure.com";

/// Save data volume shared by the restore init container and the game
pub const VOLUME_NAME_SAVE_DATA: &str = "save-data";

/// Restore init container
pub const INIT_CONTAINER_NAME_RESTORE: &str = "restore-save";
pub const INIT_CONTAINER_IMAGE: &str = "busybox:1.36";
pub const RESTORE_MARKER_FILE: &str = ".restore-complete";
pub const RESTORE_WAIT_SECONDS: u32 = 300;

/// Object store layout
pub const STORE_ROOT_PREFIX: &str = "servers";
pub const WORLD_ARCHIVE_NAME: &str = "world.tar";
pub const CONFIG_DIR_NAME: &str = "config";

/// Kubernetes DNS-1123 label length limit
pub const MAX_DNS_LABEL_LEN: usize = 63;

//! Configuration content injected into containers and processes

use super::{EntityKind, ObjectMeta, StorageObject, TypeMeta, WatchObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a config map item's content comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMapSourceType {
    #[default]
    File,
    Http,
    Https,
    Ftp,
    Ftps,
}

impl ConfigMapSourceType {
    /// Sources fetched from a remote server rather than carried inline
    pub fn is_remote(&self) -> bool {
        !matches!(self, ConfigMapSourceType::File)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigMapItem {
    #[serde(rename = "type")]
    pub source_type: ConfigMapSourceType,
    pub content: String,
    #[serde(rename = "remoteUser", skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,
    #[serde(rename = "remotePasswd", skip_serializing_if = "Option::is_none")]
    pub remote_passwd: Option<String>,
}

/// Named mapping from item key to content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigMap {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(rename = "metadata")]
    pub object_meta: ObjectMeta,
    #[serde(rename = "datas")]
    pub data: BTreeMap<String, ConfigMapItem>,
}

impl StorageObject for ConfigMap {
    const KIND: EntityKind = EntityKind::ConfigMap;

    fn namespace(&self) -> &str {
        &self.object_meta.namespace
    }

    fn name(&self) -> &str {
        &self.object_meta.name
    }

    fn from_object(object: &WatchObject) -> Option<&Self> {
        match object {
            WatchObject::ConfigMap(config_map) => Some(config_map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_map_item_decoding() {
        let config_map: ConfigMap = serde_json::from_value(serde_json::json!({
            "metadata": { "name": "game-conf", "namespace": "game" },
            "datas": {
                "server.ini": { "type": "file", "content": "port=80" },
                "remote.ini": {
                    "type": "ftps",
                    "content": "ftps://conf.example.com/remote.ini",
                    "remoteUser": "reader",
                    "remotePasswd": "secret"
                }
            }
        }))
        .unwrap();

        assert_eq!(config_map.name(), "game-conf");
        let remote = &config_map.data["remote.ini"];
        assert_eq!(remote.source_type, ConfigMapSourceType::Ftps);
        assert!(remote.source_type.is_remote());
        assert_eq!(remote.remote_user.as_deref(), Some("reader"));
        assert!(!config_map.data["server.ini"].source_type.is_remote());
    }
}

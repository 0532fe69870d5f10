//! docker-compose.yml generation

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use wpcraft_error::{Error, ErrorKind, Result};

use crate::config::Config;
use crate::docker::{MYSQL_CONTAINER, WORDPRESS_CONTAINER};

pub const NETWORK: &str = "wordpress_network";
const RESTART_POLICY: &str = "unless-stopped";

#[derive(Debug, Clone, Serialize)]
pub struct ComposeFile {
    pub version: String,
    pub services: Services,
    pub volumes: BTreeMap<String, Volume>,
    pub networks: BTreeMap<String, Network>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Services {
    pub mysql: Service,
    pub wordpress: Service,
}

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub image: String,
    pub container_name: String,
    pub restart: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub depends_on: BTreeMap<String, DependsOn>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,
    pub healthcheck: HealthCheck,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependsOn {
    pub condition: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub test: Vec<String>,
    pub interval: String,
    pub timeout: String,
    pub retries: u32,
}

impl HealthCheck {
    fn command(test: &[&str]) -> Self {
        let mut argv = vec!["CMD".to_string()];
        argv.extend(test.iter().map(|s| s.to_string()));
        Self {
            test: argv,
            interval: "10s".into(),
            timeout: "5s".into(),
            retries: 5,
        }
    }
}

/// Named volume with driver defaults
#[derive(Debug, Clone, Default, Serialize)]
pub struct Volume {}

#[derive(Debug, Clone, Serialize)]
pub struct Network {
    pub driver: String,
}

/// Compose interpolates `$NAME` and `${NAME}` inside the file; `$$` is a literal `$`
fn escape(value: &str) -> String {
    value.replace('$', "$$")
}

impl ComposeFile {
    pub fn from_config(config: &Config) -> Self {
        let db = &config.mysql.database;
        let root_flag = format!("-p{}", escape(&db.root_password));

        let mysql = Service {
            image: format!("mysql:{}", config.mysql.version),
            container_name: MYSQL_CONTAINER.into(),
            restart: RESTART_POLICY.into(),
            depends_on: BTreeMap::new(),
            ports: Vec::new(),
            environment: BTreeMap::from([
                ("MYSQL_ROOT_PASSWORD".to_string(), escape(&db.root_password)),
                ("MYSQL_DATABASE".to_string(), escape(&db.name)),
                ("MYSQL_USER".to_string(), escape(&db.user)),
                ("MYSQL_PASSWORD".to_string(), escape(&db.password)),
            ]),
            volumes: vec!["mysql_data:/var/lib/mysql".into()],
            networks: vec![NETWORK.into()],
            healthcheck: HealthCheck::command(&[
                "mysqladmin", "ping", "-h", "localhost", "-u", "root",
                root_flag.as_str(),
            ]),
        };

        let wordpress = Service {
            image: format!("wordpress:{}", config.wordpress.version),
            container_name: WORDPRESS_CONTAINER.into(),
            restart: RESTART_POLICY.into(),
            depends_on: BTreeMap::from([(
                "mysql".to_string(),
                DependsOn { condition: "service_healthy".into() },
            )]),
            ports: vec![format!("{}:80", config.wordpress.port)],
            environment: BTreeMap::from([
                ("WORDPRESS_DB_HOST".to_string(), "mysql:3306".to_string()),
                ("WORDPRESS_DB_NAME".to_string(), escape(&db.name)),
                ("WORDPRESS_DB_USER".to_string(), escape(&db.user)),
                ("WORDPRESS_DB_PASSWORD".to_string(), escape(&db.password)),
            ]),
            volumes: vec!["wordpress_data:/var/www/html".into()],
            networks: vec![NETWORK.into()],
            healthcheck: HealthCheck::command(&["curl", "-f", "http://localhost:80/"]),
        };

        Self {
            version: "3.8".into(),
            services: Services { mysql, wordpress },
            volumes: BTreeMap::from([
                ("mysql_data".to_string(), Volume::default()),
                ("wordpress_data".to_string(), Volume::default()),
            ]),
            networks: BTreeMap::from([(NETWORK.to_string(), Network { driver: "bridge".into() })]),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            Error::new(ErrorKind::SerializationFailed, "failed to render docker-compose file")
                .with_operation("compose::render")
                .set_source(e)
        })
    }
}

/// Render the compose file for `config` and write it to `path`
pub fn write_compose_file(config: &Config, path: &Path) -> Result<()> {
    let yaml = ComposeFile::from_config(config).to_yaml()?;
    std::fs::write(path, yaml).map_err(|e| {
        Error::from(e)
            .with_operation("compose::write")
            .with_context("path", path.display().to_string())
    })?;
    tracing::info!(path = %path.display(), "created docker-compose file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;

    #[test]
    fn test_compose_structure() {
        let yaml = ComposeFile::from_config(&sample_config()).to_yaml().unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(doc["version"].as_str(), Some("3.8"));

        let mysql = &doc["services"]["mysql"];
        assert_eq!(mysql["image"].as_str(), Some("mysql:8.0"));
        assert_eq!(mysql["container_name"].as_str(), Some("wordpress_mysql"));
        assert_eq!(mysql["restart"].as_str(), Some("unless-stopped"));
        assert_eq!(mysql["environment"]["MYSQL_DATABASE"].as_str(), Some("wordpress"));
        assert_eq!(mysql["healthcheck"]["test"][7].as_str(), Some("-prootpass"));
        assert_eq!(mysql["healthcheck"]["retries"].as_u64(), Some(5));
        assert!(mysql.get("ports").is_none());

        let wp = &doc["services"]["wordpress"];
        assert_eq!(wp["image"].as_str(), Some("wordpress:6.4"));
        assert_eq!(wp["ports"][0].as_str(), Some("8080:80"));
        assert_eq!(wp["depends_on"]["mysql"]["condition"].as_str(), Some("service_healthy"));
        assert_eq!(wp["environment"]["WORDPRESS_DB_HOST"].as_str(), Some("mysql:3306"));
        assert_eq!(wp["volumes"][0].as_str(), Some("wordpress_data:/var/www/html"));

        assert!(doc["volumes"]["mysql_data"].is_mapping());
        assert_eq!(doc["networks"]["wordpress_network"]["driver"].as_str(), Some("bridge"));
    }

    #[test]
    fn test_special_characters_survive() {
        let yaml = ComposeFile::from_config(&sample_config()).to_yaml().unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            doc["services"]["wordpress"]["environment"]["WORDPRESS_DB_PASSWORD"].as_str(),
            Some("p@ss:word#1")
        );

        let mut config = sample_config();
        config.mysql.database.root_password = "pa$word".into();
        config.mysql.database.password = "${HOME}x".into();
        let yaml = ComposeFile::from_config(&config).to_yaml().unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        let mysql = &doc["services"]["mysql"];
        assert_eq!(mysql["environment"]["MYSQL_ROOT_PASSWORD"].as_str(), Some("pa$$word"));
        assert_eq!(mysql["healthcheck"]["test"][7].as_str(), Some("-ppa$$word"));
        assert_eq!(mysql["environment"]["MYSQL_PASSWORD"].as_str(), Some("$${HOME}x"));
        assert_eq!(
            doc["services"]["wordpress"]["environment"]["WORDPRESS_DB_PASSWORD"].as_str(),
            Some("$${HOME}x")
        );
        assert!(!yaml.replace("$$", "").contains('$'));
    }

    #[test]
    fn test_write_compose_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        write_compose_file(&sample_config(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("wordpress_app"));

        let err = write_compose_file(&sample_config(), &dir.path().join("missing/dir.yml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }
}

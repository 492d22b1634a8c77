use crate::models::{ClientConfig, FolderDefinition, ProxySettings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Prefix for environment overrides of the client configuration,
/// e.g. `FOLDERSYNC_CONNECTIONS__FOLDERSYNC__URL`.
pub const ENV_PREFIX: &str = "FOLDERSYNC";

const FOLDER_DIR_NAME: &str = "folders";
pub(crate) const DEFINITION_EXTENSION: &str = "yaml";

/// Read-only view of the stored connections, consumed by
/// [`ProtocolClient`](crate::services::ProtocolClient).
///
/// An empty `handle` selects the default configuration.
pub trait ConnectionStore: Send + Sync {
    /// Base URL of the named connection, normalized to end with `/`.
    fn base_url(&self, handle: &str, connection: &str) -> Option<String>;

    /// PEM bundle of extra trusted CA certificates for this handle.
    fn ca_certificates(&self, handle: &str) -> Vec<u8>;

    fn proxy(&self, handle: &str) -> ProxySettings;

    fn connection_exists(&self, handle: &str, connection: &str) -> bool {
        self.base_url(handle, connection).is_some()
    }
}

/// Configuration manager for the YAML configuration store.
///
/// Manages two kinds of files below the configuration directory:
/// - Client config (`client.yaml` or `client-<handle>.yaml`): connections, proxy
/// - Folder definitions (`folders/<escaped alias>.yaml`): one file per sync folder
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    folder_dir: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// Creates the directory (and the folder definition directory) if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();
        let folder_dir = config_dir.join(FOLDER_DIR_NAME);

        if !folder_dir.exists() {
            fs::create_dir_all(&folder_dir)
                .with_context(|| format!("Failed to create config directory: {}", folder_dir))?;
        }

        Ok(Self {
            config_dir,
            folder_dir,
        })
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn folder_dir(&self) -> &Utf8Path {
        &self.folder_dir
    }

    /// Path of the client config file for a config handle.
    pub fn client_config_path(&self, handle: &str) -> Utf8PathBuf {
        if handle.is_empty() {
            self.config_dir.join("client.yaml")
        } else {
            self.config_dir.join(format!("client-{}.yaml", escape_alias(handle)))
        }
    }

    /// Load the client configuration for a config handle.
    ///
    /// The YAML file is optional; environment variables prefixed with
    /// [`ENV_PREFIX`] override file values.
    pub fn load_client_config(&self, handle: &str) -> Result<ClientConfig> {
        let path = self.client_config_path(handle);
        if !path.exists() {
            tracing::debug!("Client config not found at {}, using defaults", path);
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read client config: {}", path))?;

        let config: ClientConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse client config: {}", path))?;

        Ok(config)
    }

    /// Save the client configuration for a config handle.
    pub fn save_client_config(&self, handle: &str, config: &ClientConfig) -> Result<()> {
        let path = self.client_config_path(handle);
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize client config to YAML")?;

        fs::write(&path, yaml_string)
            .with_context(|| format!("Failed to write client config: {}", path))?;

        tracing::info!("Saved client config to {}", path);
        Ok(())
    }

    fn definition_path(&self, alias: &str) -> Utf8PathBuf {
        self.folder_dir
            .join(format!("{}.{}", escape_alias(alias), DEFINITION_EXTENSION))
    }

    pub fn folder_definition_exists(&self, alias: &str) -> bool {
        self.definition_path(alias).exists()
    }

    /// Load a single folder definition by alias.
    ///
    /// # Returns
    /// `Ok(None)` if no definition file exists for the alias
    pub fn load_folder_definition(&self, alias: &str) -> Result<Option<FolderDefinition>> {
        let path = self.definition_path(alias);
        if !path.exists() {
            return Ok(None);
        }

        let file_contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read folder definition: {}", path))?;

        let mut definition: FolderDefinition = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse folder definition: {}", path))?;
        definition.alias = alias.to_string();

        Ok(Some(definition))
    }

    /// Load every stored folder definition, ordered by alias.
    ///
    /// Unreadable definition files are skipped with a warning.
    pub fn load_folder_definitions(&self) -> Result<Vec<FolderDefinition>> {
        let mut aliases = Vec::new();
        for entry in fs::read_dir(&self.folder_dir)
            .with_context(|| format!("Failed to list folder definitions: {}", self.folder_dir))?
        {
            let entry = entry?;
            let Ok(path) = Utf8PathBuf::try_from(entry.path()) else {
                tracing::warn!("Skipping non UTF-8 folder definition: {:?}", entry.path());
                continue;
            };
            if path.extension() != Some(DEFINITION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                aliases.push(unescape_alias(stem));
            }
        }
        aliases.sort();

        let mut definitions = Vec::with_capacity(aliases.len());
        for alias in aliases {
            match self.load_folder_definition(&alias) {
                Ok(Some(definition)) => definitions.push(definition),
                Ok(None) => {}
                Err(e) => tracing::warn!("Ignoring folder definition {}: {:#}", alias, e),
            }
        }

        tracing::debug!(
            "Loaded {} folder definitions from {}",
            definitions.len(),
            self.folder_dir
        );
        Ok(definitions)
    }

    /// Persist a folder definition, replacing any existing file for the alias.
    pub fn save_folder_definition(&self, definition: &FolderDefinition) -> Result<()> {
        let path = self.definition_path(&definition.alias);
        let yaml_string = serde_yaml_ng::to_string(definition)
            .context("Failed to serialize folder definition to YAML")?;

        fs::write(&path, yaml_string)
            .with_context(|| format!("Failed to write folder definition: {}", path))?;

        tracing::info!("Saved folder definition {} to {}", definition.alias, path);
        Ok(())
    }

    /// Delete the definition file for an alias.
    ///
    /// # Returns
    /// `true` if a file was removed, `false` if none existed
    pub fn remove_folder_definition(&self, alias: &str) -> Result<bool> {
        let path = self.definition_path(alias);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove folder definition: {}", path))?;
        tracing::info!("Removed folder definition {}", alias);
        Ok(true)
    }

    /// Delete every stored folder definition. There is no way back.
    pub fn remove_all_folder_definitions(&self) -> Result<usize> {
        let definitions = self.load_folder_definitions()?;
        let mut removed = 0;
        for definition in &definitions {
            if self.remove_folder_definition(&definition.alias)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn load_client_config_or_default(&self, handle: &str) -> ClientConfig {
        self.load_client_config(handle).unwrap_or_else(|e| {
            tracing::warn!("Unable to load client config for handle '{}': {:#}", handle, e);
            ClientConfig::default()
        })
    }
}

impl ConnectionStore for ConfigManager {
    fn base_url(&self, handle: &str, connection: &str) -> Option<String> {
        self.load_client_config_or_default(handle)
            .connection(connection)
            .and_then(|c| c.normalized_url())
    }

    fn ca_certificates(&self, handle: &str) -> Vec<u8> {
        self.load_client_config_or_default(handle)
            .connections
            .values()
            .flat_map(|c| c.ca_certificates.as_bytes().iter().copied())
            .collect()
    }

    fn proxy(&self, handle: &str) -> ProxySettings {
        self.load_client_config_or_default(handle).proxy
    }
}

/// Escape an alias for use as a file name (settings keys and file system share it).
pub fn escape_alias(alias: &str) -> String {
    urlencoding::encode(alias).into_owned()
}

/// Reverse of [`escape_alias`]. Malformed escapes are returned verbatim.
pub fn unescape_alias(escaped: &str) -> String {
    urlencoding::decode(escaped)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| escaped.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionSettings;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.folder_dir().exists());
    }

    #[test]
    fn test_client_config_path_per_handle() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.client_config_path("").ends_with("client.yaml"));
        assert!(manager.client_config_path("wizard").ends_with("client-wizard.yaml"));
    }

    #[test]
    fn test_missing_client_config_is_default() {
        let (manager, _temp_dir) = create_test_config_manager();
        let config = manager.load_client_config("").unwrap();
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_connection_store_reads_saved_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = ClientConfig::default();
        config.connections.insert(
            "foldersync".to_string(),
            ConnectionSettings {
                url: "https://cloud.example.com/owncloud".to_string(),
                user: "alice".to_string(),
                ca_certificates: String::new(),
            },
        );
        manager.save_client_config("", &config).unwrap();

        assert_eq!(
            manager.base_url("", "foldersync"),
            Some("https://cloud.example.com/owncloud/".to_string())
        );
        assert!(manager.connection_exists("", "foldersync"));
        assert!(!manager.connection_exists("", "other"));
        assert!(!manager.connection_exists("wizard", "foldersync"));
    }

    #[test]
    fn test_escape_roundtrip_for_awkward_alias() {
        let alias = "My Docs/2024: work";
        let escaped = escape_alias(alias);
        assert!(!escaped.contains('/'));
        assert!(!escaped.contains(':'));
        assert_eq!(unescape_alias(&escaped), alias);
    }

    #[test]
    fn test_unescape_malformed_is_verbatim() {
        assert_eq!(unescape_alias("100%"), "100%");
    }
}

use crate::config::{Handler, HarnessConfig};
use crate::environment::Environment;
use camino::Utf8PathBuf;

/// The daemon's own configuration file, rendered for one environment.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub home: Utf8PathBuf,
    pub collection: Utf8PathBuf,
    pub scratch: Utf8PathBuf,
    pub gap: u32,
    pub stopwords: Vec<String>,
    pub username: String,
    pub password: String,
    pub plugins: Utf8PathBuf,
    pub players: Vec<Handler>,
    pub tracklength: Vec<Handler>,
}

/// Stopwords are emitted in groups so lines stay readable.
const STOPWORDS_PER_LINE: usize = 10;

impl DaemonConfig {
    pub fn for_environment(env: &Environment, config: &HarnessConfig) -> Self {
        Self {
            home: env.root().to_owned(),
            collection: env.tracks_dir().to_owned(),
            scratch: env.scratch_path(),
            gap: config.daemon.gap,
            stopwords: config.daemon.stopwords.clone(),
            username: config.user.name.clone(),
            password: config.user.password.clone(),
            plugins: config.daemon.plugins.clone(),
            players: config.daemon.players.clone(),
            tracklength: config.daemon.tracklength.clone(),
        }
    }

    pub fn render(&self) -> String {
        let mut content = String::new();

        content.push_str(&format!("home {}\n", self.home));
        content.push_str(&format!("collection fs UTF-8 {}\n", self.collection));
        content.push_str(&format!("scratch {}\n", self.scratch));
        content.push_str(&format!("gap {}\n", self.gap));

        for chunk in self.stopwords.chunks(STOPWORDS_PER_LINE) {
            content.push_str(&format!("stopword {}\n", chunk.join(" ")));
        }

        // Credentials for the test user
        content.push_str(&format!("username {}\n", self.username));
        content.push_str(&format!("password {}\n", self.password));
        content.push_str(&format!("allow {} {}\n", self.username, self.password));

        content.push_str(&format!("plugins {}\n", self.plugins));
        for handler in &self.players {
            content.push_str(&format!("player {} {}\n", handler.pattern, handler.command));
        }
        for handler in &self.tracklength {
            content.push_str(&format!(
                "tracklength {} {}\n",
                handler.pattern, handler.command
            ));
        }

        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_declares_required_settings() {
        let env = Environment::new("/tmp/dtest/testroot");
        let config = HarnessConfig::default();
        let text = DaemonConfig::for_environment(&env, &config).render();

        assert!(text.contains("home /tmp/dtest/testroot\n"));
        assert!(text.contains("collection fs UTF-8 /tmp/dtest/testroot/tracks\n"));
        assert!(text.contains("scratch /tmp/dtest/testroot/scratch.ogg\n"));
        assert!(text.contains("allow fred fredpass\n"));
        assert!(text.contains("player *.ogg execraw disorder-decode\n"));
        assert!(text.contains("tracklength *.flac disorder-tracklength\n"));
    }

    #[test]
    fn test_render_wraps_stopwords() {
        let env = Environment::new("/root");
        let mut config = HarnessConfig::default();
        config.daemon.stopwords = (0..25).map(|n| format!("w{n}")).collect();
        let text = DaemonConfig::for_environment(&env, &config).render();

        let lines: Vec<&str> = text.lines().filter(|l| l.starts_with("stopword ")).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "stopword w20 w21 w22 w23 w24");
    }
}

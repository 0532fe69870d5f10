//! Web server agent: Apache, PHP and HTTP checks on the WordPress container

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wpcraft_error::{Error, Result};
use wpcraft_llm::{LlmProvider, ToolDefinition};

use crate::agent::{Agent, AgentContext, HTTP_CHECK_TIMEOUT};
use crate::config::Config;
use crate::docker::{CommandOutput, Docker, WORDPRESS_CONTAINER};
use crate::executor::AgentRun;
use crate::prompts;
use crate::toolkit::{lines_parameter, optional_count, Toolkit};

/// PHP modules WordPress needs
pub const REQUIRED_PHP_EXTENSIONS: &[&str] = &["mysqli", "gd", "curl", "zip", "mbstring"];

pub struct WebServerTools {
    config: Arc<Config>,
    docker: Arc<Docker>,
    http: reqwest::Client,
}

impl WebServerTools {
    pub fn new(config: Arc<Config>, docker: Arc<Docker>, http: reqwest::Client) -> Self {
        Self { config, docker, http }
    }

    async fn exec(&self, argv: &[&str]) -> CommandOutput {
        match self.docker.exec(WORDPRESS_CONTAINER, argv).await {
            Ok(output) => output,
            Err(e) => CommandOutput { code: 1, stdout: String::new(), stderr: format!("Error: {}", e.message()) },
        }
    }

    async fn get(&self, path: &str) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}{}", self.config.wordpress_url(), path);
        tracing::debug!(%url, "http check");
        self.http.get(url).timeout(HTTP_CHECK_TIMEOUT).send().await
    }

    async fn container_status(&self) -> String {
        match self.docker.container_state(WORDPRESS_CONTAINER).await {
            Ok(state) => format!(
                "Container status: {}, Health: {}",
                state.status,
                state.health_status().unwrap_or("N/A")
            ),
            Err(e) => format!("ERROR: Could not check container: {}", e.message()),
        }
    }

    async fn logs(&self, lines: usize) -> String {
        match self.docker.logs(WORDPRESS_CONTAINER, lines).await {
            Ok(logs) => logs,
            Err(e) => format!("ERROR: Could not get logs for {}: {}", WORDPRESS_CONTAINER, e.message()),
        }
    }

    async fn http_response(&self) -> String {
        let response = match self.get("/").await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return "FAILED: Connection to WordPress timed out.".into(),
            Err(e) if e.is_connect() => return "FAILED: Cannot connect to WordPress. Connection refused.".into(),
            Err(e) => return format!("FAILED: Error testing WordPress: {}", e),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => format!(
                "SUCCESS: HTTP {} - WordPress is responding. Content length: {} bytes",
                status,
                body.len()
            ),
            Err(e) => format!("FAILED: Error reading WordPress response: {}", e),
        }
    }

    async fn php_version(&self) -> String {
        let output = self.exec(&["php", "-v"]).await;
        if output.success() {
            format!("SUCCESS: PHP version info:\n{}", output.combined())
        } else {
            format!("FAILED: Could not get PHP version. Error: {}", output.combined())
        }
    }

    async fn apache_status(&self) -> String {
        let output = self.exec(&["apache2ctl", "-t"]).await;
        if output.success() {
            format!("SUCCESS: Apache configuration is valid:\n{}", output.combined())
        } else {
            format!("WARNING: Apache configuration check:\n{}", output.combined())
        }
    }

    async fn wordpress_files(&self) -> String {
        let output = self.exec(&["sh", "-c", "ls -la /var/www/html/ | head -20"]).await;
        if !output.success() {
            return format!("FAILED: Could not check WordPress files. Error: {}", output.combined());
        }

        let listing = output.combined();
        if listing.contains("wp-config.php") || listing.contains("wp-admin") {
            format!("SUCCESS: WordPress files are present:\n{}", listing)
        } else {
            format!("WARNING: WordPress files may be incomplete:\n{}", listing)
        }
    }

    async fn php_extensions(&self) -> String {
        let output = self.exec(&["php", "-m"]).await;
        if !output.success() {
            return format!("FAILED: Could not check PHP extensions. Error: {}", output.combined());
        }

        let loaded: Vec<String> = output.stdout
            .lines()
            .map(|line| line.trim().to_ascii_lowercase())
            .collect();
        let missing: Vec<&str> = REQUIRED_PHP_EXTENSIONS
            .iter()
            .copied()
            .filter(|ext| !loaded.iter().any(|m| m == ext))
            .collect();

        if missing.is_empty() {
            format!("SUCCESS: All required PHP extensions are loaded:\n{}", output.stdout.trim())
        } else {
            format!("WARNING: Missing extensions: {}\nLoaded:\n{}", missing.join(", "), output.stdout.trim())
        }
    }

    async fn installation_page(&self) -> String {
        let response = match self.get("/wp-admin/install.php").await {
            Ok(response) => response,
            Err(e) => return format!("ERROR: Could not access installation page: {}", e),
        };

        let status = response.status().as_u16();
        if status != 200 {
            return format!("INFO: HTTP {} - This is normal if WordPress is already installed.", status);
        }

        match response.text().await {
            Ok(body) if body.contains("WordPress") || body.to_lowercase().contains("installation") => {
                "SUCCESS: WordPress installation page is accessible and contains expected content.".into()
            }
            Ok(_) => format!(
                "WARNING: Page accessible but may not be WordPress installation page. Status: {}",
                status
            ),
            Err(e) => format!("ERROR: Could not access installation page: {}", e),
        }
    }

    async fn restart_apache(&self) -> String {
        let output = self.exec(&["apache2ctl", "graceful"]).await;
        if output.success() {
            "SUCCESS: Apache restarted successfully.".into()
        } else {
            format!("WARNING: Apache restart result: {}", output.combined())
        }
    }

    async fn restart_container(&self) -> String {
        match self.docker.restart(WORDPRESS_CONTAINER).await {
            Ok(()) => "SUCCESS: WordPress container restarted successfully.".into(),
            Err(e) => format!("FAILED: Could not restart WordPress container: {}", e.message()),
        }
    }
}

impl Toolkit for WebServerTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new("check_wordpress_container_status", "Check if the WordPress container is running and healthy."),
            ToolDefinition::new("get_wordpress_logs", "Get the most recent WordPress container log lines.")
                .with_parameters(lines_parameter()),
            ToolDefinition::new("test_http_response", "Test whether WordPress answers HTTP requests."),
            ToolDefinition::new("check_php_version", "Show the PHP version installed in the WordPress container."),
            ToolDefinition::new("check_apache_status", "Validate the Apache configuration."),
            ToolDefinition::new("verify_wordpress_files", "Verify that the WordPress files are present in the web root."),
            ToolDefinition::new("check_php_extensions", "Check that the PHP extensions WordPress needs are loaded."),
            ToolDefinition::new("test_wordpress_installation_page", "Test whether the WordPress installation page is reachable."),
            ToolDefinition::new("restart_apache", "Gracefully restart Apache inside the container."),
            ToolDefinition::new("restart_wordpress_container", "Restart the WordPress container."),
        ]
    }

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<String> {
        tracing::debug!(tool = name, "webserver tool");
        let text = match name {
            "check_wordpress_container_status" => self.container_status().await,
            "get_wordpress_logs" => self.logs(optional_count(arguments, "lines", 50)?).await,
            "test_http_response" => self.http_response().await,
            "check_php_version" => self.php_version().await,
            "check_apache_status" => self.apache_status().await,
            "verify_wordpress_files" => self.wordpress_files().await,
            "check_php_extensions" => self.php_extensions().await,
            "test_wordpress_installation_page" => self.installation_page().await,
            "restart_apache" => self.restart_apache().await,
            "restart_wordpress_container" => self.restart_container().await,
            other => return Err(Error::tool_not_found(other)),
        };
        Ok(text)
    }
}

pub struct WebServerAgent<P> {
    agent: Agent<P, WebServerTools>,
    docker: Arc<Docker>,
    health_timeout: Duration,
    port: u16,
}

impl<P: LlmProvider> WebServerAgent<P> {
    pub fn new(ctx: &AgentContext<P>) -> Self {
        let tools = WebServerTools::new(Arc::clone(&ctx.config), Arc::clone(&ctx.docker), ctx.http.clone());
        Self {
            agent: Agent::new(
                "WebServerAgent",
                prompts::WEBSERVER_SYSTEM,
                Arc::clone(&ctx.provider),
                ctx.executor_settings(),
                tools,
            ),
            docker: Arc::clone(&ctx.docker),
            health_timeout: ctx.health_timeout(),
            port: ctx.config.wordpress.port,
        }
    }

    pub fn agent(&self) -> &Agent<P, WebServerTools> {
        &self.agent
    }

    /// Wait for the container, then let the model check and repair Apache and PHP
    pub async fn validate_and_fix(&self) -> Result<AgentRun> {
        tracing::info!("web server agent: starting validation");
        tracing::info!("waiting for WordPress container to be healthy");
        if !self.docker.wait_until_healthy(WORDPRESS_CONTAINER, self.health_timeout).await {
            tracing::warn!("WordPress container health check timed out, proceeding anyway");
        }

        let run = self.agent.invoke(&prompts::webserver_task(self.port)).await.map_err(|e| {
            tracing::error!(error = %e, "web server agent failed");
            e
        })?;
        tracing::info!(output = %run.output, "web server agent completed");
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, output, test_config, text_response, ScriptedProvider, ScriptedRunner};
    use httpmock::prelude::*;
    use serde_json::json;

    fn tools_with(runner: Arc<ScriptedRunner>, config: Config) -> WebServerTools {
        let ctx = context(ScriptedProvider::new(Vec::new()), runner, config);
        WebServerTools::new(ctx.config, ctx.docker, ctx.http)
    }

    fn tools(runner: Arc<ScriptedRunner>) -> WebServerTools {
        tools_with(runner, test_config())
    }

    fn pointed_at(server: &MockServer) -> Config {
        let mut config = test_config();
        config.wordpress.host = server.host();
        config.wordpress.port = server.port();
        config
    }

    #[test]
    fn test_tool_set() {
        let agent = WebServerAgent::new(&context(
            ScriptedProvider::new(Vec::new()),
            ScriptedRunner::new(|_, _| output(0, "", "")),
            test_config(),
        ));
        assert_eq!(agent.agent().tool_count(), 10);
        assert_eq!(agent.agent().to_string(), "WebServerAgent (10 tools)");
        assert!(agent.agent().tool_names().contains(&"test_wordpress_installation_page".to_string()));
    }

    #[tokio::test]
    async fn test_http_response_success() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200).body("<html>WordPress</html>");
        }).await;

        let tools = tools_with(ScriptedRunner::new(|_, _| output(0, "", "")), pointed_at(&server));
        let text = tools.invoke("test_http_response", &json!({})).await.unwrap();
        assert_eq!(text, "SUCCESS: HTTP 200 - WordPress is responding. Content length: 22 bytes");
    }

    #[tokio::test]
    async fn test_http_response_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = test_config();
        config.wordpress.host = "127.0.0.1".into();
        config.wordpress.port = port;
        let tools = tools_with(ScriptedRunner::new(|_, _| output(0, "", "")), config);
        let text = tools.invoke("test_http_response", &json!({})).await.unwrap();
        assert_eq!(text, "FAILED: Cannot connect to WordPress. Connection refused.");
    }

    #[tokio::test]
    async fn test_installation_page() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/wp-admin/install.php");
            then.status(200).body("<title>WordPress &rsaquo; Installation</title>");
        }).await;
        let tools = tools_with(ScriptedRunner::new(|_, _| output(0, "", "")), pointed_at(&server));
        let text = tools.invoke("test_wordpress_installation_page", &json!({})).await.unwrap();
        assert!(text.starts_with("SUCCESS: WordPress installation page is accessible"));

        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/wp-admin/install.php");
            then.status(500);
        }).await;
        let tools = tools_with(ScriptedRunner::new(|_, _| output(0, "", "")), pointed_at(&server));
        let text = tools.invoke("test_wordpress_installation_page", &json!({})).await.unwrap();
        assert_eq!(text, "INFO: HTTP 500 - This is normal if WordPress is already installed.");
    }

    #[tokio::test]
    async fn test_php_extensions() {
        let runner = ScriptedRunner::new(|_, _| output(0, "[PHP Modules]\ncurl\nmbstring\nmysqli\nzip\n", ""));
        let text = tools(runner).invoke("check_php_extensions", &json!({})).await.unwrap();
        assert!(text.starts_with("WARNING: Missing extensions: gd\n"));

        let runner = ScriptedRunner::new(|_, _| output(0, "[PHP Modules]\ncurl\ngd\nmbstring\nmysqli\nzip\n", ""));
        let text = tools(runner).invoke("check_php_extensions", &json!({})).await.unwrap();
        assert!(text.starts_with("SUCCESS: All required PHP extensions are loaded"));
    }

    #[tokio::test]
    async fn test_wordpress_files_uses_shell_pipe() {
        let runner = ScriptedRunner::new(|_, _| output(0, "drwxr-xr-x wp-admin\n-rw-r--r-- wp-config.php\n", ""));
        let text = tools(runner.clone()).invoke("verify_wordpress_files", &json!({})).await.unwrap();
        assert!(text.starts_with("SUCCESS: WordPress files are present"));
        assert_eq!(runner.calls()[0], vec![
            "docker", "exec", "wordpress_app", "sh", "-c", "ls -la /var/www/html/ | head -20",
        ]);

        let runner = ScriptedRunner::new(|_, _| output(0, "index.html\n", ""));
        let text = tools(runner).invoke("verify_wordpress_files", &json!({})).await.unwrap();
        assert!(text.starts_with("WARNING: WordPress files may be incomplete"));
    }

    #[tokio::test]
    async fn test_apache_checks() {
        let runner = ScriptedRunner::new(|_, _| output(1, "", "AH00526: Syntax error"));
        let tools = tools(runner);
        let text = tools.invoke("check_apache_status", &json!({})).await.unwrap();
        assert_eq!(text, "WARNING: Apache configuration check:\nAH00526: Syntax error");
        let text = tools.invoke("restart_apache", &json!({})).await.unwrap();
        assert!(text.starts_with("WARNING: Apache restart result"));
    }

    #[tokio::test]
    async fn test_validate_and_fix_proceeds_after_health_timeout() {
        let runner = ScriptedRunner::new(|_, _| output(0, r#"{"Status":"running","Health":{"Status":"unhealthy"}}"#, ""));
        let mut config = test_config();
        config.agents.health_timeout_secs = 0;
        let provider = ScriptedProvider::new(vec![text_response("Web server looks fine.")]);
        let agent = WebServerAgent::new(&context(provider.clone(), runner, config));

        let run = agent.validate_and_fix().await.unwrap();
        assert_eq!(run.output, "Web server looks fine.");
        let task = provider.requests()[0].messages[1].content.clone().unwrap();
        assert!(task.contains("port 8080"));
    }
}

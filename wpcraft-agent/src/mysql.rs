//! MySQL agent: database container checks and repairs

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wpcraft_error::{Error, Result};
use wpcraft_llm::{LlmProvider, ToolDefinition};

use crate::agent::{Agent, AgentContext};
use crate::config::Config;
use crate::docker::{CommandOutput, Docker, MYSQL_CONTAINER};
use crate::executor::AgentRun;
use crate::prompts;
use crate::toolkit::{lines_parameter, optional_count, Toolkit};

pub struct MySqlTools {
    config: Arc<Config>,
    docker: Arc<Docker>,
}

impl MySqlTools {
    pub fn new(config: Arc<Config>, docker: Arc<Docker>) -> Self {
        Self { config, docker }
    }

    /// Exec inside the MySQL container; a failed exec is reported like a failed command
    async fn exec(&self, argv: &[&str]) -> CommandOutput {
        match self.docker.exec(MYSQL_CONTAINER, argv).await {
            Ok(output) => output,
            Err(e) => CommandOutput { code: 1, stdout: String::new(), stderr: format!("Error: {}", e.message()) },
        }
    }

    /// Run one SQL statement as root
    async fn root_query(&self, sql: &str) -> CommandOutput {
        let password = format!("-p{}", self.config.mysql.database.root_password);
        self.exec(&["mysql", "-uroot", password.as_str(), "-e", sql]).await
    }

    async fn container_status(&self) -> String {
        match self.docker.container_state(MYSQL_CONTAINER).await {
            Ok(state) => format!(
                "Container status: {}, Health: {}",
                state.status,
                state.health_status().unwrap_or("N/A")
            ),
            Err(e) => format!("ERROR: Could not check container: {}", e.message()),
        }
    }

    async fn logs(&self, lines: usize) -> String {
        match self.docker.logs(MYSQL_CONTAINER, lines).await {
            Ok(logs) => logs,
            Err(e) => format!("ERROR: Could not get logs for {}: {}", MYSQL_CONTAINER, e.message()),
        }
    }

    async fn test_connection(&self) -> String {
        let db = &self.config.mysql.database;
        let user = format!("-u{}", db.user);
        let password = format!("-p{}", db.password);
        let output = self
            .exec(&["mysql", user.as_str(), password.as_str(), "-e", "SELECT 1;", db.name.as_str()])
            .await;

        if output.success() {
            "SUCCESS: MySQL connection test passed. Database is accessible.".into()
        } else {
            format!("FAILED: MySQL connection test failed. Error: {}", output.combined())
        }
    }

    async fn verify_database(&self) -> String {
        let name = &self.config.mysql.database.name;
        let output = self.root_query(&format!("SHOW DATABASES LIKE '{}';", name)).await;

        if output.success() && output.stdout.contains(name.as_str()) {
            format!("SUCCESS: Database '{}' exists.", name)
        } else {
            format!("FAILED: Database '{}' not found. Output: {}", name, output.combined())
        }
    }

    async fn verify_permissions(&self) -> String {
        let user = &self.config.mysql.database.user;
        let output = self.root_query(&format!("SHOW GRANTS FOR '{}'@'%';", user)).await;

        if output.success() {
            format!("SUCCESS: User permissions retrieved:\n{}", output.combined())
        } else {
            format!("FAILED: Could not retrieve user permissions. Error: {}", output.combined())
        }
    }

    async fn fix_permissions(&self) -> String {
        let db = &self.config.mysql.database;
        let statements = [
            format!("GRANT ALL PRIVILEGES ON {}.* TO '{}'@'%';", db.name, db.user),
            "FLUSH PRIVILEGES;".to_string(),
        ];

        let mut results = Vec::with_capacity(statements.len());
        for sql in &statements {
            let output = self.root_query(sql).await;
            results.push(format!(
                "Statement: {}\nExit Code: {}\nOutput: {}",
                sql,
                output.code,
                output.combined()
            ));
        }

        format!("Permissions update attempted:\n{}", results.join("\n---\n"))
    }

    async fn restart(&self) -> String {
        match self.docker.restart(MYSQL_CONTAINER).await {
            Ok(()) => "SUCCESS: MySQL container restarted successfully.".into(),
            Err(e) => format!("FAILED: Could not restart MySQL container: {}", e.message()),
        }
    }
}

impl Toolkit for MySqlTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new("check_mysql_container_status", "Check if the MySQL container is running and healthy."),
            ToolDefinition::new("get_mysql_logs", "Get the most recent MySQL container log lines.")
                .with_parameters(lines_parameter()),
            ToolDefinition::new("test_mysql_connection", "Test the database connection with the WordPress credentials."),
            ToolDefinition::new("verify_database_exists", "Verify that the WordPress database exists."),
            ToolDefinition::new("verify_user_permissions", "Show the grants of the WordPress database user."),
            ToolDefinition::new("fix_mysql_permissions", "Grant the WordPress user all privileges on its database."),
            ToolDefinition::new("restart_mysql_container", "Restart the MySQL container."),
        ]
    }

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<String> {
        tracing::debug!(tool = name, "mysql tool");
        let text = match name {
            "check_mysql_container_status" => self.container_status().await,
            "get_mysql_logs" => self.logs(optional_count(arguments, "lines", 50)?).await,
            "test_mysql_connection" => self.test_connection().await,
            "verify_database_exists" => self.verify_database().await,
            "verify_user_permissions" => self.verify_permissions().await,
            "fix_mysql_permissions" => self.fix_permissions().await,
            "restart_mysql_container" => self.restart().await,
            other => return Err(Error::tool_not_found(other)),
        };
        Ok(text)
    }
}

pub struct MySqlAgent<P> {
    agent: Agent<P, MySqlTools>,
    docker: Arc<Docker>,
    health_timeout: Duration,
}

impl<P: LlmProvider> MySqlAgent<P> {
    pub fn new(ctx: &AgentContext<P>) -> Self {
        let tools = MySqlTools::new(Arc::clone(&ctx.config), Arc::clone(&ctx.docker));
        Self {
            agent: Agent::new(
                "MySQLAgent",
                prompts::MYSQL_SYSTEM,
                Arc::clone(&ctx.provider),
                ctx.executor_settings(),
                tools,
            ),
            docker: Arc::clone(&ctx.docker),
            health_timeout: ctx.health_timeout(),
        }
    }

    pub fn agent(&self) -> &Agent<P, MySqlTools> {
        &self.agent
    }

    /// Wait for the container, then let the model check and repair the database
    pub async fn validate_and_fix(&self) -> Result<AgentRun> {
        tracing::info!("MySQL agent: starting validation");
        tracing::info!("waiting for MySQL container to be healthy");
        if !self.docker.wait_until_healthy(MYSQL_CONTAINER, self.health_timeout).await {
            tracing::warn!("MySQL container health check timed out, proceeding anyway");
        }

        let run = self.agent.invoke(prompts::MYSQL_TASK).await.map_err(|e| {
            tracing::error!(error = %e, "MySQL agent failed");
            e
        })?;
        tracing::info!(output = %run.output, "MySQL agent completed");
        Ok(run)
    }
}

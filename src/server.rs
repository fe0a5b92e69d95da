use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::analyzer::{AnomalyDetector, HealthAnalyzer};
use crate::analyzer::anomaly::AnomalyRequest;
use crate::analyzer::health::HealthRequest;
use crate::config::Config;
use crate::db::{get_database_status, DbStatusRequest};
use crate::error::EngineError;
use crate::logs::{get_application_logs, LogQuery};
use crate::metrics::{get_system_metrics, SystemMetricsRequest};
use crate::store::DataStore;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError { code, message }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// A tool exposed over the wire: name, description, and parameter schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The five analysis tools, built once at startup and handed to the
/// dispatcher. Dispatch itself is an explicit match on the tool name.
pub fn tool_registry() -> Vec<ToolDef> {
    let date_prop = |desc: &str| json!({ "type": "string", "description": desc });
    vec![
        ToolDef {
            name: "get_system_metrics",
            description: "Fetch CPU and memory metrics for a date range, with per-series summaries",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": date_prop("Start date, YYYY-MM-DD (optional)"),
                    "end_date": date_prop("End date, YYYY-MM-DD, inclusive (optional)"),
                    "metric_type": {
                        "type": "string",
                        "enum": ["cpu_usage", "memory_usage", "both"],
                        "description": "Which series to fetch (default: both)"
                    }
                },
                "additionalProperties": false
            }),
        },
        ToolDef {
            name: "get_application_logs",
            description: "Fetch application logs filtered by level, component, or date range",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": date_prop("Start date, YYYY-MM-DD (optional)"),
                    "end_date": date_prop("End date, YYYY-MM-DD, inclusive (optional)"),
                    "level": {
                        "type": "string",
                        "enum": ["INFO", "WARN", "ERROR", "CRITICAL"],
                        "description": "Log level to filter on (optional)"
                    },
                    "component": {
                        "type": "string",
                        "description": "Component to filter on (optional)"
                    }
                },
                "additionalProperties": false
            }),
        },
        ToolDef {
            name: "get_database_status",
            description: "Fetch database status metrics for a date range, grouped by metric",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": date_prop("Start date, YYYY-MM-DD (optional)"),
                    "end_date": date_prop("End date, YYYY-MM-DD, inclusive (optional)"),
                    "metric_name": {
                        "type": "string",
                        "enum": ["connection_count", "query_response_time", "active_transactions", "disk_usage"],
                        "description": "Specific DB metric (optional, default all)"
                    }
                },
                "additionalProperties": false
            }),
        },
        ToolDef {
            name: "analyze_system_health",
            description: "Compute a health score, status, and issue list for a specific date",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": date_prop("Date to analyze, YYYY-MM-DD"),
                    "hours_range": {
                        "type": "integer",
                        "description": "Hours around the date to analyze (default: 2)",
                        "default": 2
                    }
                },
                "required": ["date"],
                "additionalProperties": false
            }),
        },
        ToolDef {
            name: "detect_anomalies",
            description: "Scan raw metrics, logs, and DB samples for threshold anomalies",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": date_prop("Start date for detection (optional)"),
                    "end_date": date_prop("End date for detection (optional)")
                },
                "additionalProperties": false
            }),
        },
    ]
}

/// Stdio JSON-RPC server exposing the analysis engine as callable tools.
///
/// The engine is a pure function of the on-disk data; the server keeps no
/// state across requests beyond the store handle and the analyzers'
/// threshold configuration.
pub struct McpServer {
    server_name: String,
    store: DataStore,
    health: HealthAnalyzer,
    detector: AnomalyDetector,
    tools: Vec<ToolDef>,
}

impl McpServer {
    pub fn new(config: &Config, store: DataStore) -> Self {
        Self {
            server_name: config.agent.server_name.clone(),
            health: HealthAnalyzer::new(&config.thresholds),
            detector: AnomalyDetector::new(&config.thresholds),
            store,
            tools: tool_registry(),
        }
    }

    /// Serve line-delimited JSON-RPC over stdin/stdout until EOF.
    pub async fn run(&self) -> Result<()> {
        info!(server = %self.server_name, tools = self.tools.len(), "Serving on stdio");

        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response = self.handle_line(line);
            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            stdout.write_all(&payload).await?;
            stdout.flush().await?;
        }

        info!("Stdin closed, shutting down");
        Ok(())
    }

    pub fn handle_line(&self, line: &str) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "Unparseable request line");
                return RpcResponse::error(
                    Some(Value::Null),
                    PARSE_ERROR,
                    "Parse error".to_string(),
                );
            }
        };
        self.process_message(request)
    }

    fn process_message(&self, request: RpcRequest) -> RpcResponse {
        debug!(method = %request.method, "Handling request");
        match request.method.as_str() {
            "initialize" => RpcResponse::result(request.id, self.handle_initialize()),
            "tools/list" => RpcResponse::result(
                request.id,
                json!({ "tools": self.tools }),
            ),
            "tools/call" => self.handle_call(request.id, request.params),
            other => RpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        }
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.server_name,
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    fn handle_call(&self, id: Option<Value>, params: Value) -> RpcResponse {
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return RpcResponse::error(
                    id,
                    INTERNAL_ERROR,
                    format!("Invalid tool call parameters: {}", e),
                )
            }
        };

        // Any failure inside a tool is reported as a textual payload in a
        // successful envelope rather than crashing the request loop; the
        // monitored product is Spanish-facing, so the payload is too.
        let text = match self.call_tool(&params.name, params.arguments) {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => text,
                Err(e) => {
                    return RpcResponse::error(
                        id,
                        INTERNAL_ERROR,
                        format!("Internal error: {}", e),
                    )
                }
            },
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                format!("Error ejecutando {}: {}", params.name, e)
            }
        };

        RpcResponse::result(
            id,
            json!({ "content": [{ "type": "text", "text": text }] }),
        )
    }

    fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, EngineError> {
        match name {
            "get_system_metrics" => {
                let req: SystemMetricsRequest = parse_args(arguments)?;
                to_value(get_system_metrics(&self.store, &req)?)
            }
            "get_application_logs" => {
                let query: LogQuery = parse_args(arguments)?;
                to_value(get_application_logs(&self.store, &query)?)
            }
            "get_database_status" => {
                let req: DbStatusRequest = parse_args(arguments)?;
                to_value(get_database_status(&self.store, &req)?)
            }
            "analyze_system_health" => {
                let req: HealthRequest = parse_args(arguments)?;
                to_value(self.health.analyze(&self.store, &req.date, req.hours_range)?)
            }
            "detect_anomalies" => {
                let req: AnomalyRequest = parse_args(arguments)?;
                to_value(self.detector.detect(&self.store, &req)?)
            }
            other => Err(EngineError::UnknownTool(other.to_string())),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, EngineError> {
    let arguments = if arguments.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| EngineError::InvalidParameter(e.to_string()))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, EngineError> {
    serde_json::to_value(value).map_err(|e| EngineError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::store_with;

    fn test_server() -> (tempfile::TempDir, McpServer) {
        let (dir, store) = store_with(
            r#"{"cpu_usage":[
                {"timestamp":"2024-04-15T10:00:00Z","value":96.0},
                {"timestamp":"2024-04-15T11:00:00Z","value":42.0}
            ],"memory_usage":[]}"#,
            r#"{"application_logs":[
                {"timestamp":"2024-04-15T10:30:00Z","level":"ERROR","component":"payment-api","message":"timeout en pasarela"}
            ]}"#,
            None,
        );
        let server = McpServer::new(&Config::default(), store);
        (dir, server)
    }

    fn response_json(response: &RpcResponse) -> Value {
        serde_json::to_value(response).unwrap()
    }

    fn tool_text(response: &RpcResponse) -> String {
        let v = response_json(response);
        v["result"]["content"][0]["text"]
            .as_str()
            .expect("text content")
            .to_string()
    }

    #[test]
    fn initialize_reports_server_info() {
        let (_dir, server) = test_server();
        let response =
            server.handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#);
        let v = response_json(&response);
        assert_eq!(v["id"], 1);
        assert_eq!(v["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(v["result"]["serverInfo"]["name"], "payment-monitoring");
    }

    #[test]
    fn tools_list_exposes_all_five_tools() {
        let (_dir, server) = test_server();
        let response = server.handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
        let v = response_json(&response);
        let tools = v["result"]["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec![
                "get_system_metrics",
                "get_application_logs",
                "get_database_status",
                "analyze_system_health",
                "detect_anomalies"
            ]
        );
        assert!(tools.iter().all(|t| t.get("inputSchema").is_some()));
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let (_dir, server) = test_server();
        let response = server.handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#);
        let v = response_json(&response);
        assert_eq!(v["error"]["code"], -32601);
    }

    #[test]
    fn unparseable_line_is_a_parse_error_with_null_id() {
        let (_dir, server) = test_server();
        let response = server.handle_line("{nope");
        let v = response_json(&response);
        assert_eq!(v["error"]["code"], -32700);
        assert!(v["id"].is_null());
    }

    #[test]
    fn tool_call_returns_pretty_json_text() {
        let (_dir, server) = test_server();
        let response = server.handle_line(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"detect_anomalies","arguments":{}}}"#,
        );
        let text = tool_text(&response);
        let payload: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(payload["summary"]["total_count"], 1);
        assert_eq!(payload["anomalies"][0]["type"], "HIGH_CPU");
    }

    #[test]
    fn unknown_tool_is_reported_as_text_payload() {
        let (_dir, server) = test_server();
        let response = server.handle_line(
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"reboot_everything","arguments":{}}}"#,
        );
        let text = tool_text(&response);
        assert!(text.starts_with("Error ejecutando reboot_everything:"));
    }

    #[test]
    fn engine_errors_become_text_payloads_not_crashes() {
        let (_dir, server) = test_server();
        // db.json does not exist in this fixture
        let response = server.handle_line(
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"get_database_status","arguments":{}}}"#,
        );
        let text = tool_text(&response);
        assert!(text.starts_with("Error ejecutando get_database_status:"));
        assert!(text.contains("db.json"));
    }

    #[test]
    fn missing_required_date_is_reported() {
        let (_dir, server) = test_server();
        let response = server.handle_line(
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"analyze_system_health","arguments":{}}}"#,
        );
        let text = tool_text(&response);
        assert!(text.starts_with("Error ejecutando analyze_system_health:"));
    }

    #[test]
    fn health_tool_end_to_end() {
        let (_dir, server) = test_server();
        let response = server.handle_line(
            r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"analyze_system_health","arguments":{"date":"2024-04-15"}}}"#,
        );
        let payload: Value = serde_json::from_str(&tool_text(&response)).unwrap();
        // CPU max 96 > 90: -30
        assert_eq!(payload["health_score"], 70);
        assert_eq!(payload["status"], "WARNING");
        assert_eq!(payload["issues"][0], "CPU crítico: 96.0%");
    }
}

//! 设备报文封装（`m2m:rqp` 请求 / `m2m:rsp` 响应）。
//!
//! ```json
//! {"m2m:rqp": {"op": 2, "to": "/[0]/MNAE/1/Sensor/IndoorTemperature/la", "fr": "/S", "rqi": "req_..."}}
//! {"m2m:rsp": {"fr": "...", "rqi": "req_...", "rsc": 2000, "pc": {"m2m:cin": {"con": 21.5}}}}
//! ```

use crate::error::ProtocolError;
use domain::StateValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 固定发起方标识。
pub const ORIGINATOR: &str = "/S";

/// 成功状态码。
pub const STATUS_OK: u32 = 2000;

/// 写入内容的类型标签。
pub const CONTENT_FORMAT: &str = "text/plain:0";

/// 内容实例资源类型。
const RESOURCE_TYPE_CONTENT_INSTANCE: u8 = 4;

/// 操作码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// 创建（写入）
    Create = 1,
    /// 读取
    Retrieve = 2,
}

/// 请求原语（`m2m:rqp`）。
///
/// 设备主动推送也使用同一结构，此时 `to` 为资源路径。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestPrimitive {
    #[serde(default)]
    pub op: u8,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rqi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pc: Option<PrimitiveContent>,
}

/// 响应原语（`m2m:rsp`）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsePrimitive {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rqi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pc: Option<PrimitiveContent>,
}

/// 原语内容；只关心内容实例，容器（`m2m:cnt`）等其他资源类型忽略。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimitiveContent {
    #[serde(rename = "m2m:cin", default, skip_serializing_if = "Option::is_none")]
    pub cin: Option<ContentInstance>,
}

/// 内容实例（`m2m:cin`）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentInstance {
    #[serde(default)]
    pub con: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnf: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Frame {
    #[serde(rename = "m2m:rqp", default, skip_serializing_if = "Option::is_none")]
    rqp: Option<RequestPrimitive>,
    #[serde(rename = "m2m:rsp", default, skip_serializing_if = "Option::is_none")]
    rsp: Option<ResponsePrimitive>,
}

/// 入站帧的分类结果。
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// 对某个请求的响应；`content` 仅在成功且带内容实例时存在。
    Response {
        token: Option<String>,
        path: Option<String>,
        status: Option<u32>,
        content: Option<Value>,
    },
    /// 设备主动推送。
    Notification { path: String, content: Value },
    /// 其他帧（无路径或无内容实例）。
    Ignored,
}

/// 构造读取请求。
pub fn retrieve_request(path: &str, token: &str) -> Result<String, ProtocolError> {
    encode(RequestPrimitive {
        op: Operation::Retrieve as u8,
        to: Some(path.to_string()),
        fr: Some(ORIGINATOR.to_string()),
        rqi: Some(token.to_string()),
        ty: None,
        pc: None,
    })
}

/// 构造写入请求（创建内容实例）。
pub fn write_request(path: &str, value: &StateValue, token: &str) -> Result<String, ProtocolError> {
    encode(RequestPrimitive {
        op: Operation::Create as u8,
        to: Some(path.to_string()),
        fr: Some(ORIGINATOR.to_string()),
        rqi: Some(token.to_string()),
        ty: Some(RESOURCE_TYPE_CONTENT_INSTANCE),
        pc: Some(PrimitiveContent {
            cin: Some(ContentInstance {
                con: value_to_json(value),
                cnf: Some(CONTENT_FORMAT.to_string()),
            }),
        }),
    })
}

fn encode(rqp: RequestPrimitive) -> Result<String, ProtocolError> {
    let frame = Frame {
        rqp: Some(rqp),
        rsp: None,
    };
    Ok(serde_json::to_string(&frame)?)
}

/// 解析入站帧。
pub fn parse_frame(text: &str) -> Result<InboundFrame, ProtocolError> {
    let frame: Frame = serde_json::from_str(text)?;

    if let Some(rsp) = frame.rsp {
        // 缺失状态码按成功处理；非 2000 视为无数据
        let succeeded = rsp.rsc.is_none_or(|code| code == STATUS_OK);
        let content = rsp
            .pc
            .and_then(|pc| pc.cin)
            .map(|cin| cin.con)
            .filter(|_| succeeded);
        return Ok(InboundFrame::Response {
            token: rsp.rqi,
            path: rsp.fr,
            status: rsp.rsc,
            content,
        });
    }

    if let Some(rqp) = frame.rqp {
        let content = rqp.pc.and_then(|pc| pc.cin).map(|cin| cin.con);
        if let (Some(path), Some(content)) = (rqp.to, content) {
            return Ok(InboundFrame::Notification { path, content });
        }
    }

    Ok(InboundFrame::Ignored)
}

/// JSON 内容 → 状态值。
///
/// 整数保持整数，浮点为 Number，数组/对象以 JSON 文本保存。
pub fn value_from_json(value: &Value) -> StateValue {
    match value {
        Value::Bool(v) => StateValue::Bool(*v),
        Value::Number(n) => match n.as_i64() {
            Some(v) => StateValue::Integer(v),
            None => StateValue::Number(n.as_f64().unwrap_or_default()),
        },
        Value::String(v) => StateValue::Text(v.clone()),
        Value::Null => StateValue::Text(String::new()),
        other => StateValue::Text(other.to_string()),
    }
}

/// 状态值 → JSON 内容。
pub fn value_to_json(value: &StateValue) -> Value {
    match value {
        StateValue::Bool(v) => Value::Bool(*v),
        StateValue::Integer(v) => Value::from(*v),
        StateValue::Number(v) => serde_json::Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        StateValue::Text(v) => Value::String(v.clone()),
    }
}

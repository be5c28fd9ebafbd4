//! 数据模型
//! 题目、练习记录以及文档存储中的字段值模型，所有远端数据在这里按严格模式校验

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 文档字段集合
pub type Fields = BTreeMap<String, FieldValue>;

/// 题目 id -> 练习记录，按会话缓存
pub type PracticedMap = HashMap<String, PracticedRecord>;

/// 按主题分组后的题目视图，主题顺序为首次出现的顺序
pub type GroupedView = IndexMap<Option<String>, Vec<Problem>>;

/// 文档字段值，编码方式与文档数据库 REST 接口一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    #[serde(rename = "nullValue")]
    Null(()),
    #[serde(rename = "booleanValue")]
    Boolean(bool),
    #[serde(rename = "integerValue")]
    Integer(#[serde(with = "int64_text")] i64),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "stringValue")]
    String(String),
    #[serde(rename = "timestampValue")]
    Timestamp(DateTime<Utc>),
    #[serde(rename = "bytesValue")]
    Bytes(String),
    #[serde(rename = "referenceValue")]
    Reference(String),
    #[serde(rename = "geoPointValue")]
    GeoPoint(GeoPoint),
    #[serde(rename = "arrayValue")]
    Array(ArrayValue),
    #[serde(rename = "mapValue")]
    Map(MapValue),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: Fields,
}

impl FieldValue {
    /// 字段类型名称，用于错误信息
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null(_) => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Reference(_) => "reference",
            FieldValue::GeoPoint(_) => "geo point",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        FieldValue::String(value.into())
    }
}

// 64 位整数在 REST 编码中以字符串传输
mod int64_text {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(D::Error::custom),
            Repr::Number(number) => Ok(number),
        }
    }
}

/// 存储层返回的原始文档
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// 文档不符合预期结构
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' should be {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

fn required_string(fields: &Fields, name: &'static str) -> Result<String, SchemaError> {
    match fields.get(name) {
        Some(FieldValue::String(value)) => Ok(value.clone()),
        Some(other) => Err(SchemaError::WrongType {
            field: name,
            expected: "string",
            found: other.kind(),
        }),
        None => Err(SchemaError::MissingField(name)),
    }
}

fn optional_string(fields: &Fields, name: &'static str) -> Result<Option<String>, SchemaError> {
    match fields.get(name) {
        Some(FieldValue::String(value)) => Ok(Some(value.clone())),
        Some(FieldValue::Null(_)) | None => Ok(None),
        Some(other) => Err(SchemaError::WrongType {
            field: name,
            expected: "string",
            found: other.kind(),
        }),
    }
}

fn required_timestamp(fields: &Fields, name: &'static str) -> Result<DateTime<Utc>, SchemaError> {
    match fields.get(name) {
        Some(FieldValue::Timestamp(value)) => Ok(*value),
        Some(other) => Err(SchemaError::WrongType {
            field: name,
            expected: "timestamp",
            found: other.kind(),
        }),
        None => Err(SchemaError::MissingField(name)),
    }
}

/// 题目数据结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub topic: Option<String>,
    pub question: String,
    pub link: String,
}

impl Problem {
    /// 从题库文档解析题目
    pub fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        Ok(Self {
            id: doc.id.clone(),
            topic: optional_string(&doc.fields, "topic")?,
            question: required_string(&doc.fields, "question")?,
            link: required_string(&doc.fields, "link")?,
        })
    }

    /// 转换为题库文档字段
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(topic) = &self.topic {
            fields.insert("topic".to_string(), FieldValue::string(topic));
        }
        fields.insert("question".to_string(), FieldValue::string(&self.question));
        fields.insert("link".to_string(), FieldValue::string(&self.link));
        fields
    }
}

/// 练习记录：存在即表示已练习
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticedRecord {
    pub problem_id: String,
    pub question: String,
    pub timestamp: DateTime<Utc>,
}

impl PracticedRecord {
    /// 为题目创建一条练习记录，题目文本取标记时的快照
    pub fn for_problem(problem: &Problem, timestamp: DateTime<Utc>) -> Self {
        Self {
            problem_id: problem.id.clone(),
            question: problem.question.clone(),
            timestamp,
        }
    }

    pub fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        Ok(Self {
            problem_id: doc.id.clone(),
            question: required_string(&doc.fields, "question")?,
            timestamp: required_timestamp(&doc.fields, "timestamp")?,
        })
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("question".to_string(), FieldValue::string(&self.question));
        fields.insert("timestamp".to_string(), FieldValue::Timestamp(self.timestamp));
        fields
    }
}

/// 用户 id 不合法
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUserId {
    #[error("user id must not be empty")]
    Empty,

    #[error("user id must not contain '/'")]
    ContainsSeparator,

    #[error("user id must not be '.' or '..'")]
    RelativeSegment,
}

/// 已认证用户的标识，非空、不含路径分隔符且不是 `.` 或 `..`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidUserId> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(InvalidUserId::Empty);
        }
        if raw.contains('/') {
            return Err(InvalidUserId::ContainsSeparator);
        }
        // URL 路径会吞掉这两个段
        if raw == "." || raw == ".." {
            return Err(InvalidUserId::RelativeSegment);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = InvalidUserId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        UserId::new(raw).map_err(serde::de::Error::custom)
    }
}

//! 配置模块
use crate::error::{NanoError, Result};
use std::env;
use std::time::Duration;

// ===============================================================================================
// 配置模块
// ===============================================================================================

/// API 密钥所在的环境变量
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
/// 模型名称所在的环境变量
pub const MODEL_VAR: &str = "ANTHROPIC_MODEL";
/// API 基础 URL 所在的环境变量
pub const API_BASE_VAR: &str = "ANTHROPIC_API_BASE";

const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// 流式客户端配置
///
/// 包含所有必要的配置参数，支持 Builder 模式和环境变量配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 模型名称
    pub(crate) model: String,
    /// 温度参数 (0.0-1.0)
    pub(crate) temperature: f32,
    /// 最大生成 token 数
    pub(crate) max_tokens: u32,
    /// 连接超时时间
    pub(crate) connect_timeout: Duration,
    /// API 基础 URL
    pub(crate) api_base: String,
    /// API 版本标头
    pub(crate) api_version: String,
    /// API 密钥
    pub(crate) api_key: String,
    /// 连接池空闲超时时间
    pub(crate) pool_idle_timeout: Duration,
    /// 每个主机的最大空闲连接数
    pub(crate) pool_max_idle_per_host: usize,
    /// TCP Keepalive
    pub(crate) tcp_keepalive: Duration,
    /// TCP Nodelay
    pub(crate) tcp_nodelay: bool,
}

impl Default for Config {
    /// 创建默认配置
    ///
    /// API 密钥留空，需要通过环境变量或 `with_api_key` 提供
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: 0.7,
            max_tokens: 1024,
            connect_timeout: Duration::from_secs(30),
            api_base: DEFAULT_API_BASE.into(),
            api_version: "2023-06-01".into(),
            api_key: String::new(),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 4,
            tcp_keepalive: Duration::from_secs(60),
            tcp_nodelay: true,
        }
    }
}

/// 生成 Config Builder 方法的宏
///
/// 自动生成 `with_field_name` 形式的 builder 方法
macro_rules! config_builder {
    ($field:ident, $type:ty) => {
        paste::paste! {
            #[doc = "设置 `"]
            #[doc = stringify!($field)]
            #[doc = "`"]
            pub fn [<with_ $field>](mut self, $field: $type) -> Self {
                self.$field = $field;
                self
            }
        }
    };
}

impl Config {
    pub fn model(&self) -> &str { &self.model }
    pub fn temperature(&self) -> f32 { self.temperature }
    pub fn max_tokens(&self) -> u32 { self.max_tokens }
    pub fn connect_timeout(&self) -> Duration { self.connect_timeout }
    pub fn api_base(&self) -> &str { &self.api_base }
    pub fn api_version(&self) -> &str { &self.api_version }
    pub fn api_key(&self) -> &str { &self.api_key }

    /// 是否已经提供了非空的 API 密钥
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// 从环境变量和 `.env` 文件加载配置
    ///
    /// 环境变量会覆盖 `.env` 文件中的设置；缺少 API 密钥时返回 [`NanoError::Config`]
    pub fn from_env() -> Result<Self> {
        let config = Self::from_env_lenient();
        if !config.has_api_key() {
            return Err(NanoError::Config(format!(
                "未找到 API 密钥，请在 .env 文件中设置 {}",
                API_KEY_VAR
            )));
        }
        Ok(config)
    }

    /// 与 [`Config::from_env`] 相同，但不要求 API 密钥
    ///
    /// 模型和 API 基础 URL 照常读取，密钥缺失时留空，由客户端在提交时报告
    pub fn from_env_lenient() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Config::default();
        Config {
            api_key: env::var(API_KEY_VAR).unwrap_or_default(),
            model: env::var(MODEL_VAR).unwrap_or_else(|_| defaults.model.clone()),
            api_base: env::var(API_BASE_VAR).unwrap_or_else(|_| defaults.api_base.clone()),
            ..defaults
        }
    }

    // 使用宏生成 builder 方法
    config_builder!(api_base, String);
    config_builder!(api_version, String);
    config_builder!(model, String);
    config_builder!(api_key, String);
    config_builder!(temperature, f32);
    config_builder!(max_tokens, u32);
    config_builder!(connect_timeout, Duration);
    config_builder!(pool_idle_timeout, Duration);
    config_builder!(pool_max_idle_per_host, usize);
    config_builder!(tcp_keepalive, Duration);
    config_builder!(tcp_nodelay, bool);
}

//! 提示词表单模块
//!
//! 收集提示词与生成参数，在任何网络活动之前拒绝空提交。
use crate::config::Config;
use crate::error::{NanoError, Result};

/// 最大 token 数的下限
pub const MIN_MAX_TOKENS: u32 = 100;
/// 最大 token 数的上限
pub const MAX_MAX_TOKENS: u32 = 5000;
/// 最大 token 数的默认值
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

const EMPTY_PROMPT: &str = "提示词不能为空！";

/// 把任意值夹到 `[MIN_MAX_TOKENS, MAX_MAX_TOKENS]`，相当于滑块控件的行为
pub fn clamp_max_tokens(value: u32) -> u32 {
    value.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS)
}

/// 一次用户提交
///
/// 创建后不可变，生命周期止于其响应结束
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    prompt: String,
    max_output_tokens: u32,
    model: String,
    temperature: f32,
}

impl Submission {
    pub fn prompt(&self) -> &str { &self.prompt }
    pub fn max_output_tokens(&self) -> u32 { self.max_output_tokens }
    pub fn model(&self) -> &str { &self.model }
    pub fn temperature(&self) -> f32 { self.temperature }
}

/// 表单当前的输入状态
#[derive(Debug, Clone)]
pub struct PromptForm {
    prompt: String,
    max_tokens: u32,
    model: String,
    temperature: f32,
}

impl Default for PromptForm {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PromptForm {
    /// 使用默认参数创建表单
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::default().with_prompt(prompt)
    }

    /// 以配置中的模型、温度和 token 上限作为初始值
    pub fn from_config(config: &Config) -> Self {
        Self {
            prompt: String::new(),
            max_tokens: clamp_max_tokens(config.max_tokens()),
            model: config.model().to_string(),
            temperature: config.temperature().clamp(0.0, 1.0),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// 设置最大 token 数，超出范围时自动夹紧
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = clamp_max_tokens(max_tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// 设置温度，夹紧到 `[0, 1]`
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = if temperature.is_nan() { 0.0 } else { temperature.clamp(0.0, 1.0) };
        self
    }

    pub fn prompt(&self) -> &str { &self.prompt }
    pub fn max_tokens(&self) -> u32 { self.max_tokens }

    /// 校验并生成 [`Submission`]
    ///
    /// 去除空白后为空的提示词返回 [`NanoError::Validation`]，不会触碰网络
    pub fn submit(&self) -> Result<Submission> {
        if self.prompt.trim().is_empty() {
            return Err(NanoError::Validation(EMPTY_PROMPT.to_string()));
        }

        Ok(Submission {
            prompt: self.prompt.clone(),
            max_output_tokens: self.max_tokens,
            model: self.model.clone(),
            temperature: self.temperature,
        })
    }
}

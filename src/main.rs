//! # NanoStream 终端前端
//!
//! 单页交互：输入提示词、调整最大 token 数、查看实时生成的响应。
use clap::Parser;
use colored::*;
use log::warn;
use nanostream::{
    CompletionClient, Config, ErrorKind, PromptForm, Session, Status, View,
    form::{DEFAULT_MAX_TOKENS, MAX_MAX_TOKENS, MIN_MAX_TOKENS},
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use spinners::{Spinner, Spinners};
use std::io::{self, Write};
use std::process::ExitCode;

/// 命令行参数
#[derive(Parser)]
#[command(
    name = "nanostream",
    version,
    about = "输入任意提示词，实时查看模型生成的响应"
)]
struct CliArgs {
    /// 最大生成 token 数
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_TOKENS,
        value_parser = clap::value_parser!(u32).range(MIN_MAX_TOKENS as i64..=MAX_MAX_TOKENS as i64)
    )]
    max_tokens: u32,

    /// 模型名称，覆盖 ANTHROPIC_MODEL
    #[arg(long)]
    model: Option<String>,

    /// 温度 (0.0-1.0)
    #[arg(long, value_parser = parse_temperature)]
    temperature: Option<f32>,

    /// 只执行一次该提示词然后退出
    #[arg(long)]
    prompt: Option<String>,
}

fn parse_temperature(raw: &str) -> Result<f32, String> {
    let value: f32 = raw.parse().map_err(|e| format!("{}", e))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err("温度必须在 0.0 到 1.0 之间".to_string())
    }
}

fn separator() -> ColoredString {
    "─".repeat(50).bright_black()
}

/// 清除当前行，用于擦掉旋转指示器
const CLEAR_LINE: &str = "\r\x1B[K";

/// 终端视图：旋转指示器表示进行中，文本只追加新到达的部分
struct TerminalView<W: Write = io::Stdout> {
    out: W,
    animate: bool,
    spinner: Option<Spinner>,
    in_progress: bool,
    printed: usize,
}

impl TerminalView {
    fn stdout() -> Self {
        Self::new(io::stdout(), true)
    }
}

impl<W: Write> TerminalView<W> {
    fn new(out: W, animate: bool) -> Self {
        Self {
            out,
            animate,
            spinner: None,
            in_progress: false,
            printed: 0,
        }
    }

    /// 停止进度提示并立即清除该行，之后输出到 stderr 的内容不会落在旋转指示器上
    fn stop_progress(&mut self) {
        if !self.in_progress {
            return;
        }
        self.in_progress = false;
        if let Some(mut sp) = self.spinner.take() {
            sp.stop();
        }
        let _ = write!(self.out, "{}", CLEAR_LINE);
        let _ = self.out.flush();
    }
}

impl<W: Write> View for TerminalView<W> {
    fn show_status(&mut self, status: Status) {
        match status {
            Status::Streaming => {
                self.printed = 0;
                self.in_progress = true;
                if self.animate {
                    self.spinner = Some(Spinner::new(
                        Spinners::Dots12,
                        "正在生成响应... 请稍候".bright_magenta().to_string(),
                    ));
                }
            }
            Status::Done => {
                self.stop_progress();
                let _ = writeln!(self.out);
                let _ = writeln!(self.out, "{}", separator());
                let _ = self.out.flush();
            }
            Status::Error => {
                self.stop_progress();
                let _ = writeln!(self.out, "{}", separator());
                let _ = self.out.flush();
            }
            Status::Idle | Status::Validating => {}
        }
    }

    fn show_transcript(&mut self, transcript: &str) {
        self.stop_progress();
        let fresh = transcript.get(self.printed..).unwrap_or(transcript);
        let _ = write!(self.out, "{}", fresh);
        let _ = self.out.flush();
        self.printed = transcript.len();
    }

    fn show_error(&mut self, message: &str) {
        self.stop_progress();
        if self.printed > 0 {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
        }
        eprintln!("{} {}", "错误:".bright_red(), message);
    }
}

/// 交互模式下的一行输入
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Quit,
    /// `/max` 之后的参数
    MaxTokens(&'a str),
    Prompt,
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    if trimmed == "/quit" || trimmed == "/exit" {
        return Command::Quit;
    }
    if trimmed == "/max" {
        return Command::MaxTokens("");
    }
    match trimmed.strip_prefix("/max ") {
        Some(rest) => Command::MaxTokens(rest),
        None => Command::Prompt,
    }
}

/// 处理 `/max <n>` 命令，返回调整后的表单
fn adjust_max_tokens(form: PromptForm, raw: &str) -> PromptForm {
    match raw.trim().parse::<u32>() {
        Ok(requested) => {
            let form = form.with_max_tokens(requested);
            if form.max_tokens() != requested {
                println!(
                    "{} 最大 token 数需在 {}-{} 之间，已调整为 {}",
                    "!".bright_yellow(),
                    MIN_MAX_TOKENS,
                    MAX_MAX_TOKENS,
                    form.max_tokens()
                );
            } else {
                println!("{} 最大 token 数: {}", "✓".bright_green(), form.max_tokens());
            }
            form
        }
        Err(_) => {
            eprintln!("{} 用法: /max <{}-{}>", "错误:".bright_red(), MIN_MAX_TOKENS, MAX_MAX_TOKENS);
            form
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = CliArgs::parse();

    // 缺少密钥时仍然启动，错误会在每次提交时显示
    let config = Config::from_env().unwrap_or_else(|e| {
        warn!("{}", e);
        Config::from_env_lenient()
    });

    let mut form = PromptForm::from_config(&config).with_max_tokens(args.max_tokens);
    if let Some(model) = args.model {
        form = form.with_model(model);
    }
    if let Some(temperature) = args.temperature {
        form = form.with_temperature(temperature);
    }

    let session = Session::new(CompletionClient::new(config));
    let mut view = TerminalView::stdout();

    if let Some(prompt) = args.prompt {
        let outcome = session.submit(&form.with_prompt(prompt), &mut view).await;
        return Ok(match outcome {
            Ok(outcome) if outcome.status == Status::Done => ExitCode::SUCCESS,
            _ => ExitCode::FAILURE,
        });
    }

    println!("{}", "NanoStream 流式响应控制台".bright_cyan());
    println!("输入任意提示词，模型会实时生成响应，可以是代码请求或一般问题。");
    println!(
        "{}",
        "/max <n> 调整最大 token 数，/quit 退出".bright_black()
    );
    println!("{}", separator());

    let mut rl = DefaultEditor::new()?;

    loop {
        io::stdout().flush()?;
        let readline = rl.readline(&format!("[max {}] > ", form.max_tokens()));
        match readline {
            Ok(line) => {
                match parse_command(&line) {
                    Command::Quit => break,
                    Command::MaxTokens(rest) => {
                        form = adjust_max_tokens(form, rest);
                        continue;
                    }
                    Command::Prompt => {}
                }
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(trimmed);
                }

                let current = form.clone().with_prompt(line);
                match session.submit(&current, &mut view).await {
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::Busy => {
                        eprintln!("{} {}", "错误:".bright_red(), e);
                    }
                    // 校验错误已经由视图显示
                    Err(_) => {}
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "错误:".bright_red(), err);
                break;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

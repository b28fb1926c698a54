//! 调研流程中的三个文本生成角色：查询规划、相关性判断、答案综合

use crate::llm::ChatMessage;

pub mod planner;
pub mod relevance;
pub mod synthesizer;

pub use planner::QueryPlanner;
pub use relevance::{Assessment, RelevanceJudge};
pub use synthesizer::Synthesizer;

/// Prompt模板配置
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// 系统提示词，为空时不发送系统消息
    pub system_prompt: String,
    /// 开头的说明性指令
    pub opening_instruction: String,
    /// 结尾的强调性指令
    pub closing_instruction: String,
}

impl PromptTemplate {
    /// 把正文夹在开头与结尾指令之间，生成消息列表
    pub fn render(&self, body: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.is_empty() {
            messages.push(ChatMessage::system(self.system_prompt.clone()));
        }

        let user = [
            self.opening_instruction.as_str(),
            body,
            self.closing_instruction.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n");
        messages.push(ChatMessage::user(user));
        messages
    }
}

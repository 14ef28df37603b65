mod generator;
mod prompts;

pub use generator::{
    FakeTextGenerator, GeminiTextGenerator, TextGenerator, GEMINI_API_URL, GEMINI_TEXT_MODEL,
};
pub(crate) use generator::{user_content, GeminiHttp, GenerateRequest};
pub use prompts::{article_summary_prompt, daily_digest_prompt, talk_script_prompt};

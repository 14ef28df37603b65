//! Prompt templates sent to the text generator.
//!
//! URLs are always placed one per line so both the provider and the offline
//! generator can pick them out.

const SUMMARY_MAX_CHARS: usize = 500;
const DIGEST_MAX_CHARS: usize = 1200;

pub fn article_summary_prompt(url: &str) -> String {
    format!(
        "Summarize the article at the following URL:\n\
         {url}\n\
         Rules:\n\
         - Keep the summary under {SUMMARY_MAX_CHARS} characters.\n\
         - Respond with the summary only."
    )
}

pub fn daily_digest_prompt(urls: &[String]) -> String {
    format!(
        "Write a single combined digest of today's reading list.\n\
         Articles:\n\
         {}\n\
         Rules:\n\
         - Cover every article, grouping related topics together.\n\
         - Keep the digest under {DIGEST_MAX_CHARS} characters.\n\
         - Respond with the digest only.",
        urls.join("\n")
    )
}

pub fn talk_script_prompt(urls: &[String]) -> String {
    format!(
        "Summarize each of the following articles, then turn those summaries into a \
         conversation between two hosts.\n\
         Articles:\n\
         {}\n\
         Rules:\n\
         - The hosts are Speaker1 and Speaker2.\n\
         - Start every line with \"Speaker1: \" or \"Speaker2: \".\n\
         - Cover every article.\n\
         - Respond with the script only.",
        urls.join("\n")
    )
}

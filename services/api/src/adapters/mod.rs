pub mod counsellor_llm;
pub mod db;

pub use counsellor_llm::OpenAiCounsellorAdapter;
pub use db::DbAdapter;

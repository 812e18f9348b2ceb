pub mod call;
pub mod events;
pub mod jid;
pub mod lid_pn;
pub mod message;
pub mod newsletter;
pub mod presence;
pub mod spam_report;
pub mod user;

pub use lid_pn::{LearningSource, LidPnEntry};
pub use spam_report::{SpamFlow, SpamReportRequest, SpamReportResult, build_spam_list_node};

use wacore_binary::builder::NodeBuilder;
use wacore_binary::jid::Jid;
use wacore_binary::node::Node;

/// The type of spam flow indicating the source of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpamFlow {
    /// Report triggered from group spam banner
    GroupSpamBannerReport,
    /// Report triggered from group info screen
    GroupInfoReport,
    /// Report triggered from message context menu
    #[default]
    MessageMenu,
    /// Report triggered from contact info screen
    ContactInfo,
    /// Report triggered from status view
    StatusReport,
}

impl SpamFlow {
    /// Returns the string representation of the spam flow.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpamFlow::GroupSpamBannerReport => "GroupSpamBannerReport",
            SpamFlow::GroupInfoReport => "GroupInfoReport",
            SpamFlow::MessageMenu => "MessageMenu",
            SpamFlow::ContactInfo => "ContactInfo",
            SpamFlow::StatusReport => "StatusReport",
        }
    }
}

/// A request to report a message as spam.
#[derive(Debug, Clone, Default)]
pub struct SpamReportRequest {
    /// The message ID being reported
    pub message_id: String,
    /// The timestamp of the message
    pub message_timestamp: u64,
    /// The JID the message was from (sender)
    pub from_jid: Option<Jid>,
    /// For group messages, the participant JID
    pub participant_jid: Option<Jid>,
    /// For group reports, the group JID
    pub group_jid: Option<Jid>,
    /// For group reports, the group subject/name
    pub group_subject: Option<String>,
    /// The type of spam flow
    pub spam_flow: SpamFlow,
    /// Raw message bytes (protobuf encoded)
    pub raw_message: Option<Vec<u8>>,
    /// Media type of the message (if applicable)
    pub media_type: Option<String>,
    /// Local message type
    pub local_message_type: Option<String>,
}

/// The result of a spam report.
#[derive(Debug, Clone)]
pub struct SpamReportResult {
    /// The report ID returned by the server
    pub report_id: Option<String>,
}

/// Build the spam_list node for a spam report.
///
/// This constructs the XML/binary node structure required by WhatsApp's spam reporting API.
///
/// # Arguments
/// * `request` - The spam report request containing message details
///
/// # Returns
/// A `Node` representing the spam_list element
pub fn build_spam_list_node(request: &SpamReportRequest) -> Node {
    let mut message_attrs = vec![
        ("id", request.message_id.clone()),
        ("t", request.message_timestamp.to_string()),
    ];

    if let Some(ref from) = request.from_jid {
        message_attrs.push(("from", from.to_string()));
    }

    if let Some(ref participant) = request.participant_jid {
        message_attrs.push(("participant", participant.to_string()));
    }

    let mut message_children = Vec::new();

    if let Some(ref raw) = request.raw_message {
        let mut raw_attrs = vec![("v", "3".to_string())];

        if let Some(ref media_type) = request.media_type {
            raw_attrs.push(("mediatype", media_type.clone()));
        }

        if let Some(ref local_type) = request.local_message_type {
            raw_attrs.push(("local_message_type", local_type.clone()));
        }

        let raw_node = NodeBuilder::new("raw")
            .attrs(raw_attrs)
            .bytes(raw.clone())
            .build();

        message_children.push(raw_node);
    }

    let message_node = NodeBuilder::new("message")
        .attrs(message_attrs)
        .children(message_children)
        .build();

    let mut spam_list_attrs = vec![("spam_flow", request.spam_flow.as_str().to_string())];

    if let Some(ref group_jid) = request.group_jid {
        spam_list_attrs.push(("jid", group_jid.to_string()));
    }

    if let Some(ref subject) = request.group_subject {
        spam_list_attrs.push(("subject", subject.clone()));
    }

    NodeBuilder::new("spam_list")
        .attrs(spam_list_attrs)
        .children([message_node])
        .build()
}

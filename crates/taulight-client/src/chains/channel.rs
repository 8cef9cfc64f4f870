//! Channels, members, invite codes, dialogs and groups.

use std::time::Duration;

use taulight_core::ChainError;
use taulight_proto::payloads::{
    channel::{
        AvatarResponse, ChannelRequest, CheckCode, CodesResponse, DialogAvatarRequest,
        DialogRequest, FileRecord, InviteCode, InviteCodeResponse, MemberRecord, MembersRequest,
        MembersResponse, UseCode,
    },
    session::{Ack, GroupRequest},
};
use uuid::Uuid;

use super::{acked_id, catalog_chain};

catalog_chain!(
    /// Channel management: create, leave, invite, list codes, avatar.
    ChannelChain,
    "channel"
);

catalog_chain!(
    /// Member listing.
    MembersChain,
    "members"
);

catalog_chain!(
    /// Invite code lookup and redemption.
    CodeChain,
    "code"
);

catalog_chain!(
    /// Dialog creation and avatars.
    DialogChain,
    "dialog"
);

catalog_chain!(
    /// Group membership requests. Fire-and-forget.
    GroupChain,
    "group"
);

impl ChannelChain {
    /// Create a channel; returns its chat id.
    pub async fn create(&self, title: &str) -> Result<Uuid, ChainError> {
        let ack: Ack = self.0.call(ChannelRequest::Create { title: title.to_string() }).await?;
        acked_id(ack)
    }

    /// Leave a chat.
    pub async fn leave(&self, chat_id: Uuid) -> Result<(), ChainError> {
        let _: Ack = self.0.call(ChannelRequest::Leave { chat_id }).await?;
        Ok(())
    }

    /// Invite `nickname`; returns the invite code.
    pub async fn invite(
        &self,
        chat_id: Uuid,
        nickname: &str,
        ttl: Duration,
    ) -> Result<String, ChainError> {
        let request = ChannelRequest::Invite {
            chat_id,
            nickname: nickname.to_string(),
            expires_in_secs: ttl.as_secs(),
        };
        let reply: InviteCodeResponse = self.0.call(request).await?;
        Ok(reply.code)
    }

    /// Invite codes issued for a chat.
    pub async fn codes(&self, chat_id: Uuid) -> Result<Vec<InviteCode>, ChainError> {
        let reply: CodesResponse = self.0.call(ChannelRequest::Codes { chat_id }).await?;
        Ok(reply.codes)
    }

    /// The channel's avatar, `None` if it has none.
    pub async fn avatar(&self, chat_id: Uuid) -> Result<Option<FileRecord>, ChainError> {
        let reply: AvatarResponse = self.0.call(ChannelRequest::Avatar { chat_id }).await?;
        Ok(reply.avatar)
    }
}

impl MembersChain {
    /// Members of a chat.
    pub async fn members(&self, chat_id: Uuid) -> Result<Vec<MemberRecord>, ChainError> {
        let reply: MembersResponse = self.0.call(MembersRequest { chat_id }).await?;
        Ok(reply.members)
    }
}

impl CodeChain {
    /// Details of an invite code.
    pub async fn check(&self, code: &str) -> Result<InviteCode, ChainError> {
        self.0.call(CheckCode { code: code.to_string() }).await
    }

    /// Redeem an invite code; returns the chat joined.
    pub async fn redeem(&self, code: &str) -> Result<Uuid, ChainError> {
        let ack: Ack = self.0.call(UseCode { code: code.to_string() }).await?;
        acked_id(ack)
    }
}

impl DialogChain {
    /// Open (or find) the dialog with `nickname`; returns its chat id.
    pub async fn open(&self, nickname: &str) -> Result<Uuid, ChainError> {
        let ack: Ack = self.0.call(DialogRequest { nickname: nickname.to_string() }).await?;
        acked_id(ack)
    }

    /// The dialog's avatar, `None` if it has none.
    pub async fn avatar(&self, chat_id: Uuid) -> Result<Option<FileRecord>, ChainError> {
        let reply: AvatarResponse = self.0.call(DialogAvatarRequest { chat_id }).await?;
        Ok(reply.avatar)
    }
}

impl GroupChain {
    /// Ask to join `group`. The hub does not answer.
    pub async fn join(&self, group: &str) -> Result<(), ChainError> {
        self.0.send(GroupRequest { group: group.to_string() }).await
    }
}

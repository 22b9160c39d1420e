use chrono::Utc;
use rand::Rng;

use super::domain::{ApplicantCategory, MemberId};

/// Source of candidate member identifiers. Candidates are not guaranteed unique; the
/// registration service checks the store before committing one.
pub trait MemberIdSource: Send + Sync {
    fn issue(&self, category: ApplicantCategory) -> MemberId;
}

/// `{prefix}{4 random digits}{last 4 digits of the current Unix time in milliseconds}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomMemberIds;

impl RandomMemberIds {
    pub fn compose(category: ApplicantCategory, random: u16, unix_millis: i64) -> MemberId {
        let random = if (1000..=9999).contains(&random) {
            random
        } else {
            1000 + random % 9000
        };
        let time_suffix = unix_millis.rem_euclid(10_000);
        MemberId(format!(
            "{}{random:04}{time_suffix:04}",
            category.member_id_prefix()
        ))
    }
}

impl MemberIdSource for RandomMemberIds {
    fn issue(&self, category: ApplicantCategory) -> MemberId {
        let random = rand::thread_rng().gen_range(1000..=9999u16);
        Self::compose(category, random, Utc::now().timestamp_millis())
    }
}

use std::collections::HashSet;

/// Likes needed before a user's next room message is broadcast.
pub const POST_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Accepted,
    AlreadyLiked,
}

/// Post eligibility of one user plus who liked their pending post.
#[derive(Debug, Clone, Default)]
pub struct Reputation {
    eligible: u32,
    liked_by: HashSet<String>,
}

impl Reputation {
    /// A freshly logged-in user may post right away.
    pub fn fresh() -> Self {
        Self {
            eligible: POST_THRESHOLD,
            liked_by: HashSet::new(),
        }
    }

    pub fn eligible_count(&self) -> u32 {
        self.eligible
    }

    pub fn can_post(&self) -> bool {
        self.eligible >= POST_THRESHOLD
    }

    pub fn on_posted(&mut self) {
        self.eligible = 0;
        self.liked_by.clear();
    }

    pub fn like(&mut self, liker: &str) -> LikeOutcome {
        if self.liked_by.contains(liker) {
            return LikeOutcome::AlreadyLiked;
        }

        self.liked_by.insert(liker.to_owned());
        self.eligible += 1;
        LikeOutcome::Accepted
    }
}

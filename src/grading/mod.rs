//! Grading core
//!
//! Pure, database-free pieces of the grading pipeline:
//!
//! ```text
//!  attention samples ──► aggregator ──► Percent ─┐
//!                                                ├─► compositor ──► final grade
//!  quiz answers ──────► quiz scorer ──► Percent ─┘        ▲
//!                                                       weights
//! ```

pub mod aggregator;
pub mod compositor;
pub mod quiz;
pub mod scale;
pub mod weights;

pub use aggregator::{AttentionAggregator, AverageOverride, OverrideFields, ScoreParseError};
pub use compositor::compose;
pub use quiz::{score_quiz, AnswerKey, QuestionKind, QuizAnswer, QuizScore};
pub use scale::{Percent, ScaleView};
pub use weights::{WeightCache, WeightConfig, WeightError};

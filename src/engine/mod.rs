// src/engine/mod.rs

//! Pure quiz rules: admission, question drawing, grading.
//! Nothing in here touches storage or the clock.

pub mod eligibility;
pub mod policy;
pub mod scoring;
pub mod selector;

pub use eligibility::{Eligibility, EligibilityInput, can_start_quiz};
pub use policy::QuizPolicy;
pub use selector::{SelectionError, select_quiz_questions};

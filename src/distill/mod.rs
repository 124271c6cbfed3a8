//! Knowledge Distillation
//!
//! Losses that transfer ranking signal from a teacher model's scores to the
//! sparse student.
//!
//! ## Example
//!
//! ```ignore
//! use esparcir::distill::MarginMseLoss;
//!
//! let loss = MarginMseLoss.forward(&student_scores, &teacher_scores)?;
//! ```

mod margin_mse;

pub use margin_mse::MarginMseLoss;

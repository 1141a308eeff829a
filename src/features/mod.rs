pub mod antibot;

pub use antibot::CaptchaGuard;

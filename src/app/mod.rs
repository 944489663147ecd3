mod session;

#[cfg(test)]
mod tests;

pub use session::DetectionSession;

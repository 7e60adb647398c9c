pub(crate) mod attempt_finalize;
pub(crate) mod attempt_session;
pub(crate) mod exam_loader;
pub(crate) mod integrity;
pub(crate) mod scoring;
pub(crate) mod session_registry;

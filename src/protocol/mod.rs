//! Wire codecs for the two UDP protocols the agent speaks

pub mod presence;
pub mod sntp;

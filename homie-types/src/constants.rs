pub const HOMIE_VERSION: &str = "4.0.0";
pub const DEFAULT_ROOT_TOPIC: &str = "homie";

pub const HOMIE: &str = "$homie";
pub const NAME: &str = "$name";
pub const STATE: &str = "$state";
pub const NODES: &str = "$nodes";

pub const TYPE: &str = "$type";
pub const PROPERTIES: &str = "$properties";

pub const DATATYPE: &str = "$datatype";
pub const FORMAT: &str = "$format";
pub const SETTABLE: &str = "$settable";
pub const RETAINED: &str = "$retained";
pub const UNIT: &str = "$unit";

pub const SET: &str = "set";

pub const STATE_INIT: &str = "init";
pub const STATE_READY: &str = "ready";
pub const STATE_LOST: &str = "lost";

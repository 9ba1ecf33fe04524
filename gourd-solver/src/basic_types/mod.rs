pub(crate) mod trail;

pub(crate) use trail::Trail;

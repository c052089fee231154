pub mod remote_collect;

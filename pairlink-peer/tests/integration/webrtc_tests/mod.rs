mod test_loopback_session;

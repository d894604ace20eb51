/// Assert that every host agrees on the state of `class`, given each host's
/// expected view: the server's, then each client's in order
#[macro_export]
macro_rules! assert_authority {
    ($network:expr, $class:expr, server: $server:expr, clients: [$($client:expr),* $(,)?]) => {
        assert_eq!(
            $network.server.authority_state($class),
            Some($server),
            "server view of {:?}",
            $class
        );
        let expected = [$($client),*];
        for (index, state) in expected.iter().enumerate() {
            assert_eq!(
                $network.clients[index].authority_state($class),
                Some(*state),
                "client {} view of {:?}",
                index,
                $class
            );
        }
    };
}

mod verification_cache_tests;
